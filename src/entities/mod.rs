//! Entities listed by the clinic front end
//!
//! [`Record`] is schemaless and works with any backend payload; the typed
//! entities come with their filter descriptor and field rules.

#[macro_use]
pub mod macros;

pub mod invoice;
pub mod patient;
pub mod record;
pub mod user;

pub use invoice::{Invoice, InvoiceStatus};
pub use patient::{Address, Patient};
pub use record::Record;
pub use user::User;
