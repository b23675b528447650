//! Core module containing fundamental traits and types for collection views

pub mod cache;
pub mod entity;
pub mod error;
pub mod events;
pub mod field;
pub mod gateway;
pub mod query;
pub mod session;
pub mod validation;

pub use cache::{InMemoryCache, ResponseCache};
pub use entity::{Entity, FieldAccess, Patch};
pub use error::{CollectionError, CollectionResult, ValidationError};
pub use events::{EventBus, ViewEvent};
pub use field::{FieldFormat, FieldValue};
pub use gateway::CollectionGateway;
pub use query::{FilterSpec, ListQuery, ListResult, PageSpec, PaginationMode, SortSpec};
pub use session::{SessionProvider, SessionState, SharedSession};
pub use validation::FieldRules;
