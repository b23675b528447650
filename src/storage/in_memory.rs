//! In-memory implementation of CollectionGateway for testing and development

use crate::core::entity::{Entity, Patch};
use crate::core::error::CollectionError;
use crate::core::gateway::CollectionGateway;
use crate::core::query::{ListQuery, ListResult, PaginatedResponse, PaginationMeta, QueryParams};
use crate::core::validation::FieldRules;
use crate::engine::{CollectionDescriptor, paginate, select};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

type UpdateGuard<T> = Arc<dyn Fn(&T, &T) -> Result<(), String> + Send + Sync>;

#[derive(Debug, Clone)]
struct Stored<T> {
    entity: T,
    deleted_at: Option<DateTime<Utc>>,
}

impl<T> Stored<T> {
    fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// In-memory gateway implementation
///
/// Keeps insertion order, soft-deletes on `remove` and answers `list` with
/// the same filter/sort/page engine the views use. Useful for testing and
/// development. Uses RwLock for thread-safe access.
pub struct InMemoryGateway<T: Entity> {
    records: Arc<RwLock<IndexMap<String, Stored<T>>>>,
    descriptor: CollectionDescriptor<T>,
    rules: FieldRules,
    guard: Option<UpdateGuard<T>>,
}

impl<T: Entity> Clone for InMemoryGateway<T> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            descriptor: self.descriptor.clone(),
            rules: self.rules.clone(),
            guard: self.guard.clone(),
        }
    }
}

impl<T: Entity> InMemoryGateway<T> {
    /// Create an empty gateway answering filters from `descriptor`
    pub fn new(descriptor: CollectionDescriptor<T>) -> Self {
        Self {
            records: Arc::new(RwLock::new(IndexMap::new())),
            descriptor,
            rules: FieldRules::new(),
            guard: None,
        }
    }

    /// Validate every created or updated entity against `rules`
    pub fn with_rules(mut self, rules: FieldRules) -> Self {
        self.rules = rules;
        self
    }

    /// Reject updates `guard(current, next)` refuses, as `Conflict`
    pub fn with_update_guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&T, &T) -> Result<(), String> + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// Store entities as they are, ids included; empty ids get a fresh one
    pub fn with_records(self, entities: impl IntoIterator<Item = T>) -> Result<Self, CollectionError> {
        {
            let mut records = self.write()?;
            for mut entity in entities {
                if entity.id().is_empty() {
                    entity.assign_id(Uuid::new_v4().to_string());
                }
                records.insert(
                    entity.id().to_string(),
                    Stored {
                        entity,
                        deleted_at: None,
                    },
                );
            }
        }
        Ok(self)
    }

    /// Number of live (not removed) entities
    pub fn len(&self) -> usize {
        self.read()
            .map(|records| records.values().filter(|s| s.is_live()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bring a removed entity back
    ///
    /// Restoring a live entity is a no-op.
    pub fn restore(&self, id: &str) -> Result<T, CollectionError> {
        let mut records = self.write()?;
        let stored = records
            .get_mut(id)
            .ok_or_else(|| CollectionError::not_found(T::resource_name(), id))?;
        stored.deleted_at = None;
        Ok(stored.entity.clone())
    }

    /// Answer a remote-style list request
    pub fn query(&self, params: &QueryParams) -> Result<PaginatedResponse<T>, CollectionError> {
        let query = params.to_query()?;
        let page = query.page.unwrap_or_default();
        let result = self.list_now(&query)?;
        Ok(PaginatedResponse {
            pagination: PaginationMeta::new(page.page, page.per_page, result.total),
            data: result.items,
        })
    }

    fn list_now(&self, query: &ListQuery) -> Result<ListResult<T>, CollectionError> {
        self.descriptor.validate_filter(&query.filter)?;
        if let Some(page) = &query.page {
            page.validate()?;
        }

        let records = self.read()?;
        let selected = select(
            &self.descriptor,
            records.values().filter(|s| s.is_live()).map(|s| &s.entity),
            &query.filter,
            query.sort.as_ref(),
        );
        let total = selected.len();
        let items = match &query.page {
            Some(page) => paginate(&selected, page),
            None => selected.into_iter().cloned().collect(),
        };

        Ok(ListResult { items, total })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, IndexMap<String, Stored<T>>>, CollectionError> {
        self.records
            .read()
            .map_err(|e| CollectionError::Internal(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, IndexMap<String, Stored<T>>>, CollectionError> {
        self.records
            .write()
            .map_err(|e| CollectionError::Internal(format!("Failed to acquire write lock: {}", e)))
    }

    fn live_mut<'a>(
        records: &'a mut IndexMap<String, Stored<T>>,
        id: &str,
    ) -> Result<&'a mut Stored<T>, CollectionError> {
        records
            .get_mut(id)
            .filter(|s| s.is_live())
            .ok_or_else(|| CollectionError::not_found(T::resource_name(), id))
    }
}

#[async_trait]
impl<T: Entity> CollectionGateway<T> for InMemoryGateway<T> {
    async fn list(&self, query: &ListQuery) -> Result<ListResult<T>, CollectionError> {
        self.list_now(query)
    }

    async fn get_by_id(&self, id: &str) -> Result<T, CollectionError> {
        let records = self.read()?;
        records
            .get(id)
            .filter(|s| s.is_live())
            .map(|s| s.entity.clone())
            .ok_or_else(|| CollectionError::not_found(T::resource_name(), id))
    }

    async fn create(&self, mut entity: T) -> Result<T, CollectionError> {
        if entity.id().is_empty() || entity.is_temporary() {
            entity.assign_id(Uuid::new_v4().to_string());
        }
        self.rules.validate(&entity)?;

        let mut records = self.write()?;
        if records.contains_key(entity.id()) {
            return Err(CollectionError::conflict(
                T::resource_name(),
                entity.id(),
                "an entity with this id already exists",
            ));
        }
        records.insert(
            entity.id().to_string(),
            Stored {
                entity: entity.clone(),
                deleted_at: None,
            },
        );

        Ok(entity)
    }

    async fn update(&self, id: &str, patch: &Patch) -> Result<T, CollectionError> {
        let mut records = self.write()?;
        let stored = Self::live_mut(&mut records, id)?;

        let mut next = stored.entity.clone();
        next.apply_patch(patch)?;
        self.rules.validate(&next)?;
        if let Some(guard) = &self.guard {
            guard(&stored.entity, &next)
                .map_err(|message| CollectionError::conflict(T::resource_name(), id, message))?;
        }

        stored.entity = next.clone();
        Ok(next)
    }

    async fn remove(&self, id: &str) -> Result<(), CollectionError> {
        let mut records = self.write()?;
        let stored = records
            .get_mut(id)
            .ok_or_else(|| CollectionError::not_found(T::resource_name(), id))?;

        // Removing twice succeeds and keeps the first timestamp
        if stored.deleted_at.is_none() {
            stored.deleted_at = Some(Utc::now());
        }

        Ok(())
    }
}
