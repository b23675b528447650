//! Gateway trait for remote collections

use crate::core::entity::{Entity, Patch};
use crate::core::error::CollectionError;
use crate::core::field::FieldValue;
use crate::core::query::{ListQuery, ListResult};
use async_trait::async_trait;

/// Remote operations on one entity type
///
/// A gateway is a pure I/O boundary: it keeps no cached state and performs no
/// side effect beyond the remote call. Implementations are agnostic to the
/// backend (in-memory, REST, document store) as long as they honour the
/// failure contract of each method.
#[async_trait]
pub trait CollectionGateway<T: Entity>: Send + Sync {
    /// List matching entities
    ///
    /// With `query.page` set, returns exactly that page and the total match
    /// count; without it, returns every match. Zero matches is
    /// `ListResult { items: [], total: 0 }`, never an error. Unknown filter
    /// keys fail with `Validation`.
    async fn list(&self, query: &ListQuery) -> Result<ListResult<T>, CollectionError>;

    /// Get an entity by ID, `NotFound` if it does not exist
    async fn get_by_id(&self, id: &str) -> Result<T, CollectionError>;

    /// Create an entity; the server assigns the id
    async fn create(&self, payload: T) -> Result<T, CollectionError>;

    /// Apply a partial update
    ///
    /// `NotFound` after a concurrent deletion, `Conflict` when the change is
    /// no longer compatible with the stored entity.
    async fn update(&self, id: &str, patch: &Patch) -> Result<T, CollectionError>;

    /// Remove an entity; removing an already removed id succeeds
    async fn remove(&self, id: &str) -> Result<(), CollectionError>;

    /// Narrow single-field update used for toggles
    async fn set_field(
        &self,
        id: &str,
        field: &str,
        value: FieldValue,
    ) -> Result<T, CollectionError> {
        let mut patch = Patch::new();
        patch.insert(field.to_string(), value);
        self.update(id, &patch).await
    }
}
