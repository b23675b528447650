//! Collection views
//!
//! A [`CollectionView`] owns the visible state of one rendered list: the
//! filter/sort/page spec, the last fetched items, loading and error flags,
//! and the optimistic patches of mutations still in flight.
//!
//! - [`controller`]: spec setters, debounced fetching, stale-response
//!   rejection, session tracking
//! - [`mutation`]: optimistic create/update/toggle/remove with exact rollback
//!
//! Views are cheap to clone; clones share the same state. Each rendered list
//! gets its own view: two views over the same entity type never share data.
//!
//! # Example
//!
//! ```rust,ignore
//! let view = CollectionView::builder(gateway, session)
//!     .descriptor(Patient::descriptor())
//!     .options(ViewOptions::default().per_page(10))
//!     .build()?;
//! view.mount();
//!
//! view.set_search("maria");          // fetched 300 ms after the last keystroke
//! view.toggle_field(&id, "favorite").await?;
//! let state = view.snapshot();       // { items, total, loading, error }
//! ```

pub mod controller;
pub mod mutation;

pub use controller::CollectionViewBuilder;
pub use mutation::{MutationToken, OptimisticPatch, PendingChange};

use mutation::Settled;

use crate::core::cache::ResponseCache;
use crate::core::entity::Entity;
use crate::core::error::CollectionError;
use crate::core::events::{EventBus, ViewEvent};
use crate::core::gateway::CollectionGateway;
use crate::core::query::{PaginationMode, SortSpec, ViewSpec};
use crate::core::session::SessionProvider;
use crate::engine::CollectionDescriptor;
use indexmap::IndexMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default debounce window between the last spec change and the fetch
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Fetch lifecycle of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing fetched yet (or the session went away)
    #[default]
    Idle,
    Fetching,
    Loaded,
    /// The latest fetch failed; previous items are still shown
    Errored,
}

/// What a renderer needs to draw the list
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub loading: bool,
    pub error: Option<CollectionError>,
    pub phase: Phase,
}

/// Per-view behaviour, fixed at construction
#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub pagination: PaginationMode,
    pub debounce: Duration,
    pub per_page: usize,
    pub default_sort: Option<SortSpec>,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            pagination: PaginationMode::Client,
            debounce: DEFAULT_DEBOUNCE,
            per_page: 20,
            default_sort: None,
        }
    }
}

impl ViewOptions {
    pub fn pagination(mut self, mode: PaginationMode) -> Self {
        self.pagination = mode;
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn default_sort(mut self, sort: SortSpec) -> Self {
        self.default_sort = Some(sort);
        self
    }
}

/// One entity as held by the view, tagged while an optimistic create is pending
#[derive(Debug, Clone)]
pub(crate) struct Row<T> {
    pub(crate) entity: T,
    pub(crate) token: Option<MutationToken>,
}

impl<T> Row<T> {
    pub(crate) fn server(entity: T) -> Self {
        Self {
            entity,
            token: None,
        }
    }

    pub(crate) fn is_pending_create(&self) -> bool {
        self.token.is_some()
    }
}

/// Filtered, sorted, paginated and optimistically mutated view of a remote collection
pub struct CollectionView<T: Entity> {
    pub(crate) inner: Arc<ViewInner<T>>,
}

impl<T: Entity> Clone for CollectionView<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct ViewInner<T: Entity> {
    pub(crate) gateway: Arc<dyn CollectionGateway<T>>,
    pub(crate) session: Arc<dyn SessionProvider>,
    pub(crate) descriptor: CollectionDescriptor<T>,
    pub(crate) options: ViewOptions,
    pub(crate) cache: Option<Arc<dyn ResponseCache>>,
    pub(crate) events: EventBus,
    pub(crate) core: Mutex<ViewCore<T>>,
}

/// Mutable state; the lock is never held across an await
pub(crate) struct ViewCore<T> {
    pub(crate) phase: Phase,
    pub(crate) spec: ViewSpec,
    pub(crate) rows: Vec<Row<T>>,
    /// Server-reported total, adjusted by pending creates and removes
    pub(crate) total: usize,
    pub(crate) error: Option<CollectionError>,
    /// Sequence number of the most recently issued `list` call
    pub(crate) issued: u64,
    /// User the current rows belong to
    pub(crate) fetched_scope: Option<String>,
    /// Phase and error to fall back to if the fetch in flight is abandoned
    pub(crate) before_fetch: Option<(Phase, Option<CollectionError>)>,
    pub(crate) mounted: bool,
    /// Set by `mount`, cleared once a `list` call has been issued
    pub(crate) fetch_on_ready: bool,
    pub(crate) debounce: Option<JoinHandle<()>>,
    pub(crate) watcher: Option<JoinHandle<()>>,
    /// Optimistic patches keyed by entity id, at most one per id
    pub(crate) pending: IndexMap<String, OptimisticPatch<T>>,
    /// Mutations settled since the last applied `list`, keyed by entity id
    pub(crate) reconciled: IndexMap<String, Settled<T>>,
    pub(crate) next_token: u64,
}

impl<T> ViewCore<T> {
    pub(crate) fn new(spec: ViewSpec) -> Self {
        Self {
            phase: Phase::Idle,
            spec,
            rows: Vec::new(),
            total: 0,
            error: None,
            issued: 0,
            fetched_scope: None,
            before_fetch: None,
            mounted: false,
            fetch_on_ready: false,
            debounce: None,
            watcher: None,
            pending: IndexMap::new(),
            reconciled: IndexMap::new(),
            next_token: 0,
        }
    }

    /// Forget fetched data; responses still in flight become stale
    pub(crate) fn clear_data(&mut self) {
        self.rows.clear();
        self.total = 0;
        self.error = None;
        self.phase = Phase::Idle;
        self.fetched_scope = None;
        self.before_fetch = None;
        self.pending.clear();
        self.reconciled.clear();
        self.issued += 1;
    }

    pub(crate) fn cancel_debounce(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
    }
}

impl<T> Drop for ViewCore<T> {
    fn drop(&mut self) {
        self.cancel_debounce();
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

impl<T: Entity> ViewInner<T> {
    pub(crate) fn core(&self) -> MutexGuard<'_, ViewCore<T>> {
        // State stays consistent between statements, so a poisoned lock is still usable
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub(crate) fn emit(&self, event: ViewEvent) {
        self.events.publish(self.descriptor.name(), event);
    }

    pub(crate) fn ready_user(&self) -> Result<String, CollectionError> {
        self.session
            .current()
            .ready_user()
            .map(str::to_string)
            .ok_or(CollectionError::Unauthenticated)
    }

    /// Cache scope of this collection for one user
    pub(crate) fn cache_scope(&self, user: &str) -> String {
        format!("{}:{}", self.descriptor.name(), user)
    }

    pub(crate) fn invalidate_cached(&self, user: &str, id: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&self.cache_scope(user), Some(id));
        }
    }
}
