//! Gateway implementations for different backends

#[cfg(feature = "in-memory")]
pub mod in_memory;
#[cfg(feature = "http")]
pub mod rest;

#[cfg(feature = "in-memory")]
pub use in_memory::InMemoryGateway;
#[cfg(feature = "http")]
pub use rest::RestGateway;
