//! Optimistic mutation coordinator
//!
//! Every mutation patches the view first, then calls the gateway. Success
//! swaps in the server's canonical entity; failure restores the exact
//! snapshot taken before the patch and hands the error back to the caller.
//! An entity id has at most one mutation in flight; a second one is
//! rejected with `Conflict` instead of racing the first.

use super::{CollectionView, Row, ViewCore};
use crate::core::entity::{Entity, Patch, temporary_id};
use crate::core::error::CollectionError;
use crate::core::events::{MutationKind, ViewEvent};
use crate::core::field::FieldValue;
use crate::core::query::ListResult;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Correlates an optimistic change with the gateway call that settles it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationToken(u64);

/// What an optimistic change did locally, and how to undo it
#[derive(Debug, Clone)]
pub enum PendingChange<T> {
    /// A temporary row was prepended
    Create,

    /// `patch` was applied over `previous`
    ///
    /// `previous` is `None` when the entity was not held locally.
    Update { patch: Patch, previous: Option<T> },

    /// The entity was taken out at `removed.0`
    Remove { removed: Option<(usize, T)> },
}

/// A change applied locally and not yet settled by the gateway
#[derive(Debug, Clone)]
pub struct OptimisticPatch<T> {
    pub entity_id: String,
    pub token: MutationToken,
    pub change: PendingChange<T>,
}

/// Server outcome of a settled mutation, kept until a `list` issued after
/// it has been applied
#[derive(Debug, Clone)]
pub(crate) struct Settled<T> {
    /// `issued` when the mutation settled
    seq: u64,
    outcome: SettledOutcome<T>,
}

#[derive(Debug, Clone)]
enum SettledOutcome<T> {
    Created(T),
    Saved(T),
    Removed,
}

impl<T: Entity> ViewCore<T> {
    fn issue_token(&mut self) -> MutationToken {
        self.next_token += 1;
        MutationToken(self.next_token)
    }

    fn ensure_idle(&self, entity_type: &str, id: &str) -> Result<(), CollectionError> {
        if self.pending.contains_key(id) {
            return Err(CollectionError::conflict(
                entity_type,
                id,
                "another change to this entity is still in flight",
            ));
        }
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.entity.id() == id)
    }

    /// Remove the pending entry for `id` if it still belongs to `token`
    ///
    /// `None` means the view was reset while the call was in flight.
    fn settle(&mut self, id: &str, token: MutationToken) -> Option<OptimisticPatch<T>> {
        if self.pending.get(id).is_some_and(|p| p.token == token) {
            self.pending.shift_remove(id)
        } else {
            None
        }
    }

    fn record_settled(&mut self, id: &str, outcome: SettledOutcome<T>) {
        let seq = self.issued;
        self.reconciled.insert(id.to_string(), Settled { seq, outcome });
    }

    /// Replace the held rows with the result of `list` call `seq`, keeping
    /// every unsettled optimistic change visible on top of it
    ///
    /// Mutations that settled after call `seq` was issued win over its
    /// possibly older copy of their entity.
    pub(crate) fn install(&mut self, seq: u64, result: ListResult<T>) {
        let mut rows: Vec<Row<T>> = result.items.into_iter().map(Row::server).collect();
        let mut total = result.total;
        let mut created = Vec::new();

        for (id, settled) in std::mem::take(&mut self.reconciled) {
            if settled.seq < seq {
                continue;
            }
            let index = rows.iter().position(|row| row.entity.id() == id);
            match (settled.outcome, index) {
                (SettledOutcome::Saved(entity), Some(index)) => rows[index].entity = entity,
                (SettledOutcome::Removed, Some(index)) => {
                    rows.remove(index);
                    total = total.saturating_sub(1);
                }
                (SettledOutcome::Created(entity), None) => {
                    rows.insert(0, Row::server(entity));
                    total += 1;
                }
                _ => {}
            }
        }

        for pending in self.pending.values_mut() {
            match &mut pending.change {
                PendingChange::Create => {
                    if let Some(row) = self
                        .rows
                        .iter()
                        .find(|row| row.token == Some(pending.token))
                    {
                        created.push(row.clone());
                    }
                }
                PendingChange::Update { patch, previous } => {
                    if let Some(row) = rows
                        .iter_mut()
                        .find(|row| row.entity.id() == pending.entity_id)
                    {
                        let mut patched = row.entity.clone();
                        if patched.apply_patch(patch).is_ok() {
                            *previous = Some(std::mem::replace(&mut row.entity, patched));
                        }
                    }
                }
                PendingChange::Remove { removed } => {
                    match rows
                        .iter()
                        .position(|row| row.entity.id() == pending.entity_id)
                    {
                        Some(index) => {
                            let row = rows.remove(index);
                            total = total.saturating_sub(1);
                            *removed = Some((index, row.entity));
                        }
                        None => *removed = None,
                    }
                }
            }
        }

        total += created.len();
        created.extend(rows);
        self.rows = created;
        self.total = total;
    }

    fn pending_creates(&self) -> usize {
        self.rows.iter().filter(|row| row.is_pending_create()).count()
    }
}

impl<T: Entity> CollectionView<T> {
    /// Create `draft`, showing it at the top of the view until the gateway answers
    ///
    /// Resolves with the server's entity, or with the gateway error after the
    /// temporary row is gone again.
    pub async fn create(&self, draft: T) -> Result<T, CollectionError> {
        let inner = &self.inner;
        let user = inner.ready_user()?;

        let (token, temp_id) = {
            let mut core = inner.core();
            let token = core.issue_token();
            let temp_id = temporary_id();
            let mut local = draft.clone();
            local.assign_id(temp_id.clone());
            core.rows.insert(
                0,
                Row {
                    entity: local,
                    token: Some(token),
                },
            );
            core.total += 1;
            core.pending.insert(
                temp_id.clone(),
                OptimisticPatch {
                    entity_id: temp_id.clone(),
                    token,
                    change: PendingChange::Create,
                },
            );
            (token, temp_id)
        };
        inner.emit(ViewEvent::MutationApplied {
            kind: MutationKind::Create,
            entity_id: temp_id.clone(),
        });

        let result = inner.gateway.create(draft).await;

        {
            let mut core = inner.core();
            let tracked = core.settle(&temp_id, token).is_some();
            let slot = core.rows.iter().position(|row| row.token == Some(token));
            match (&result, slot) {
                (Ok(created), Some(index)) if tracked => {
                    // A refetch that landed meanwhile may already list it
                    let mut index = index;
                    if let Some(dup) = core
                        .rows
                        .iter()
                        .position(|row| row.token.is_none() && row.entity.id() == created.id())
                    {
                        core.rows.remove(dup);
                        core.total = core.total.saturating_sub(1);
                        if dup < index {
                            index -= 1;
                        }
                    }
                    core.rows[index] = Row::server(created.clone());
                    core.record_settled(created.id(), SettledOutcome::Created(created.clone()));
                }
                (Err(_), Some(index)) if tracked => {
                    core.rows.remove(index);
                    core.total = core.total.saturating_sub(1);
                }
                _ => {}
            }
        }

        match result {
            Ok(created) => {
                inner.invalidate_cached(&user, created.id());
                info!(collection = inner.name(), id = created.id(), "created");
                inner.emit(ViewEvent::MutationReconciled {
                    kind: MutationKind::Create,
                    entity_id: created.id().to_string(),
                });
                Ok(created)
            }
            Err(err) => {
                warn!(collection = inner.name(), error = %err, "create failed, temporary row removed");
                inner.emit(ViewEvent::MutationRolledBack {
                    kind: MutationKind::Create,
                    entity_id: temp_id,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Apply `patch` to entity `id` optimistically, then persist it
    pub async fn update(&self, id: &str, patch: Patch) -> Result<T, CollectionError> {
        let gateway = Arc::clone(&self.inner.gateway);
        let target = id.to_string();
        let payload = patch.clone();
        let call = async move { gateway.update(&target, &payload).await }.boxed();
        self.patch_entity(id, patch, call).await
    }

    /// Narrow single-field update
    pub async fn set_field(
        &self,
        id: &str,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<T, CollectionError> {
        let value = value.into();
        let mut patch = Patch::new();
        patch.insert(field.to_string(), value.clone());

        let gateway = Arc::clone(&self.inner.gateway);
        let target = id.to_string();
        let field = field.to_string();
        let call = async move { gateway.set_field(&target, &field, value).await }.boxed();
        self.patch_entity(id, patch, call).await
    }

    /// Flip a boolean field of a locally held entity
    pub async fn toggle_field(&self, id: &str, field: &str) -> Result<T, CollectionError> {
        let current = {
            let core = self.inner.core();
            let index = core
                .position(id)
                .ok_or_else(|| CollectionError::not_found(self.inner.name(), id))?;
            core.rows[index].entity.field_value(field)
        };

        match current {
            Some(FieldValue::Boolean(value)) => self.set_field(id, field, !value).await,
            Some(other) => Err(CollectionError::invalid_argument(
                field,
                format!("cannot toggle a {} field", other.kind()),
            )),
            None => Err(CollectionError::invalid_argument(
                field,
                format!("{} has no field '{}'", self.inner.name(), field),
            )),
        }
    }

    async fn patch_entity(
        &self,
        id: &str,
        patch: Patch,
        call: BoxFuture<'static, Result<T, CollectionError>>,
    ) -> Result<T, CollectionError> {
        let inner = &self.inner;
        let user = inner.ready_user()?;

        let token = {
            let mut core = inner.core();
            core.ensure_idle(inner.name(), id)?;

            let previous = match core.position(id) {
                Some(index) => {
                    let mut patched = core.rows[index].entity.clone();
                    patched.apply_patch(&patch)?;
                    Some(std::mem::replace(&mut core.rows[index].entity, patched))
                }
                None => None,
            };

            let token = core.issue_token();
            core.pending.insert(
                id.to_string(),
                OptimisticPatch {
                    entity_id: id.to_string(),
                    token,
                    change: PendingChange::Update { patch, previous },
                },
            );
            token
        };
        inner.emit(ViewEvent::MutationApplied {
            kind: MutationKind::Update,
            entity_id: id.to_string(),
        });

        let result = call.await;
        inner.invalidate_cached(&user, id);

        {
            let mut core = inner.core();
            let settled = core.settle(id, token);
            let index = core.position(id);
            match (&result, settled, index) {
                (Ok(entity), Some(_), index) => {
                    if let Some(index) = index {
                        core.rows[index].entity = entity.clone();
                    }
                    core.record_settled(id, SettledOutcome::Saved(entity.clone()));
                }
                (
                    Err(_),
                    Some(OptimisticPatch {
                        change:
                            PendingChange::Update {
                                previous: Some(previous),
                                ..
                            },
                        ..
                    }),
                    Some(index),
                ) => {
                    core.rows[index].entity = previous;
                }
                _ => {}
            }
        }

        match result {
            Ok(entity) => {
                debug!(collection = inner.name(), id, "update reconciled");
                inner.emit(ViewEvent::MutationReconciled {
                    kind: MutationKind::Update,
                    entity_id: id.to_string(),
                });
                Ok(entity)
            }
            Err(err) => {
                warn!(collection = inner.name(), id, error = %err, "update failed, rolled back");
                inner.emit(ViewEvent::MutationRolledBack {
                    kind: MutationKind::Update,
                    entity_id: id.to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Remove entity `id`, taking it out of the view until the gateway answers
    ///
    /// Removing an id the view does not hold still asks the gateway, which
    /// treats already-removed ids as success; the total only moves for rows
    /// actually held.
    pub async fn remove(&self, id: &str) -> Result<(), CollectionError> {
        let inner = &self.inner;
        let user = inner.ready_user()?;

        let token = {
            let mut core = inner.core();
            core.ensure_idle(inner.name(), id)?;

            let removed = core.position(id).map(|index| {
                let row = core.rows.remove(index);
                core.total = core.total.saturating_sub(1);
                (index, row.entity)
            });

            let token = core.issue_token();
            core.pending.insert(
                id.to_string(),
                OptimisticPatch {
                    entity_id: id.to_string(),
                    token,
                    change: PendingChange::Remove { removed },
                },
            );
            token
        };
        inner.emit(ViewEvent::MutationApplied {
            kind: MutationKind::Remove,
            entity_id: id.to_string(),
        });

        let result = inner.gateway.remove(id).await;
        inner.invalidate_cached(&user, id);

        if result.is_err() {
            let mut core = inner.core();
            if let Some(OptimisticPatch {
                change:
                    PendingChange::Remove {
                        removed: Some((index, entity)),
                    },
                ..
            }) = core.settle(id, token)
            {
                let index = index.min(core.rows.len());
                core.rows.insert(index, Row::server(entity));
                core.total += 1;
            }
        } else {
            let mut core = inner.core();
            if core.settle(id, token).is_some() {
                core.record_settled(id, SettledOutcome::Removed);
            }
        }

        match result {
            Ok(()) => {
                info!(collection = inner.name(), id, "removed");
                inner.emit(ViewEvent::MutationReconciled {
                    kind: MutationKind::Remove,
                    entity_id: id.to_string(),
                });
                Ok(())
            }
            Err(err) => {
                warn!(collection = inner.name(), id, error = %err, "remove failed, row restored");
                inner.emit(ViewEvent::MutationRolledBack {
                    kind: MutationKind::Remove,
                    entity_id: id.to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Number of mutations waiting for the gateway
    pub fn pending_count(&self) -> usize {
        self.inner.core().pending.len()
    }

    /// Whether entity `id` has a mutation in flight
    pub fn is_pending(&self, id: &str) -> bool {
        self.inner.core().pending.contains_key(id)
    }

    /// Number of temporary rows shown for creates in flight
    pub fn pending_creates(&self) -> usize {
        self.inner.core().pending_creates()
    }
}
