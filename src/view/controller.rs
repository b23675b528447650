//! Debounced query controller
//!
//! Spec setters update the held [`ViewSpec`] at once and schedule a `list`
//! call after the debounce window; a change inside the window restarts it.
//! Every issued call gets a sequence number and only the response to the
//! latest one is applied, so a slow early response can never overwrite a
//! faster later one.

use super::{CollectionView, Phase, Row, ViewCore, ViewInner, ViewOptions, ViewState};
use crate::core::cache::ResponseCache;
use crate::core::entity::Entity;
use crate::core::error::{CollectionError, ValidationError};
use crate::core::events::{EventBus, EventEnvelope, ViewEvent};
use crate::core::field::FieldValue;
use crate::core::gateway::CollectionGateway;
use crate::core::query::{PageSpec, PaginationMode, SortSpec, ViewSpec};
use crate::core::session::{SessionProvider, SessionState};
use crate::engine::{CollectionDescriptor, Pagination, compute_view};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Builder for [`CollectionView`]
pub struct CollectionViewBuilder<T: Entity> {
    gateway: Arc<dyn CollectionGateway<T>>,
    session: Arc<dyn SessionProvider>,
    descriptor: Option<CollectionDescriptor<T>>,
    options: ViewOptions,
    cache: Option<Arc<dyn ResponseCache>>,
    events: Option<EventBus>,
}

impl<T: Entity> CollectionViewBuilder<T> {
    /// Filters and searchable fields; defaults to a bare descriptor for `T`
    pub fn descriptor(mut self, descriptor: CollectionDescriptor<T>) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn options(mut self, options: ViewOptions) -> Self {
        self.options = options;
        self
    }

    /// Cache used by [`CollectionView::detail`]
    pub fn cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Publish on a shared bus instead of a private one
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<CollectionView<T>, CollectionError> {
        let page = PageSpec::new(1, self.options.per_page)?;
        let spec = ViewSpec {
            sort: self.options.default_sort.clone(),
            page,
            ..ViewSpec::default()
        };

        Ok(CollectionView {
            inner: Arc::new(ViewInner {
                gateway: self.gateway,
                session: self.session,
                descriptor: self
                    .descriptor
                    .unwrap_or_else(CollectionDescriptor::for_entity),
                options: self.options,
                cache: self.cache,
                events: self.events.unwrap_or_default(),
                core: Mutex::new(ViewCore::new(spec)),
            }),
        })
    }
}

impl<T: Entity> CollectionView<T> {
    pub fn builder(
        gateway: Arc<dyn CollectionGateway<T>>,
        session: Arc<dyn SessionProvider>,
    ) -> CollectionViewBuilder<T> {
        CollectionViewBuilder {
            gateway,
            session,
            descriptor: None,
            options: ViewOptions::default(),
            cache: None,
            events: None,
        }
    }

    /// Start tracking the session and fetch as soon as a user is ready
    ///
    /// Must be called from within a tokio runtime. Mounting twice is a no-op;
    /// mounting again after [`unmount`](Self::unmount) fetches again.
    pub fn mount(&self) {
        let receiver = self.inner.session.subscribe();
        let mut core = self.inner.core();
        if core.mounted {
            return;
        }
        core.mounted = true;
        core.fetch_on_ready = true;
        core.watcher = Some(tokio::spawn(watch_session(
            Arc::downgrade(&self.inner),
            receiver,
        )));
        debug!(collection = self.inner.name(), "view mounted");
    }

    /// Stop the view: pending debounce timers are cancelled and responses
    /// still in flight will be ignored
    ///
    /// An abandoned fetch leaves the phase and error it found behind.
    pub fn unmount(&self) {
        let mut core = self.inner.core();
        core.mounted = false;
        core.cancel_debounce();
        if core.phase == Phase::Fetching {
            let (phase, error) = core.before_fetch.take().unwrap_or_default();
            core.phase = phase;
            core.error = error;
        }
        core.before_fetch = None;
        core.issued += 1;
        if let Some(watcher) = core.watcher.take() {
            watcher.abort();
        }
        debug!(collection = self.inner.name(), "view unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.core().mounted
    }

    /// Set a named filter; unknown names are rejected without touching the spec
    pub fn set_filter(
        &self,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), CollectionError> {
        if !self.inner.descriptor.has_filter(name) {
            return Err(ValidationError::UnsupportedFilter {
                key: name.to_string(),
            }
            .into());
        }
        let value = value.into();
        self.update_spec(true, |spec| {
            spec.filter.set(name, value);
            spec.page.page = 1;
        });
        Ok(())
    }

    pub fn clear_filter(&self, name: &str) {
        self.update_spec(true, |spec| {
            spec.filter.clear(name);
            spec.page.page = 1;
        });
    }

    /// Set the free-text search; blank text disables it
    pub fn set_search(&self, text: impl Into<String>) {
        let text = text.into();
        self.update_spec(true, |spec| {
            spec.filter.search = Some(text);
            spec.page.page = 1;
        });
    }

    /// Replace the single sort key, or remove sorting with `None`
    pub fn set_sort(&self, sort: Option<SortSpec>) {
        self.update_spec(true, |spec| {
            spec.sort = sort;
            spec.page.page = 1;
        });
    }

    /// Go to `page` (starting at 1)
    ///
    /// Client-side pagination recomputes locally without fetching.
    pub fn set_page(&self, page: usize) -> Result<(), CollectionError> {
        if page == 0 {
            return Err(CollectionError::invalid_argument("page", "pages start at 1"));
        }
        let refetch = self.inner.options.pagination == PaginationMode::Server;
        self.update_spec(refetch, |spec| spec.page.page = page);
        Ok(())
    }

    pub fn set_per_page(&self, per_page: usize) -> Result<(), CollectionError> {
        if per_page == 0 {
            return Err(CollectionError::invalid_argument(
                "per_page",
                "must be greater than zero",
            ));
        }
        let refetch = self.inner.options.pagination == PaginationMode::Server;
        self.update_spec(refetch, |spec| {
            spec.page = PageSpec { page: 1, per_page };
        });
        Ok(())
    }

    fn update_spec(&self, refetch: bool, change: impl FnOnce(&mut ViewSpec)) {
        change(&mut self.inner.core().spec);
        self.inner.emit(ViewEvent::SpecChanged);
        if refetch {
            self.inner.schedule_fetch();
        }
    }

    /// Fetch now, skipping any pending debounce
    ///
    /// Resolves once the response is applied, discarded as superseded, or
    /// failed. Returns `Unauthenticated` without a gateway call when no
    /// user is ready; an unmounted view does nothing.
    pub async fn refresh(&self) -> Result<(), CollectionError> {
        self.inner.core().cancel_debounce();
        self.inner.fetch().await
    }

    /// The current visible state
    pub fn snapshot(&self) -> ViewState<T> {
        let core = self.inner.core();
        let pagination = match self.inner.options.pagination {
            PaginationMode::Client => Pagination::Client,
            PaginationMode::Server => Pagination::Server { total: core.total },
        };
        let loading = core.phase == Phase::Fetching;

        match compute_view(
            &self.inner.descriptor,
            core.rows.iter().map(|row| &row.entity),
            &core.spec,
            pagination,
        ) {
            Ok(slice) => ViewState {
                items: slice.items,
                total: slice.total,
                loading,
                error: core.error.clone(),
                phase: core.phase,
            },
            Err(err) => ViewState {
                items: Vec::new(),
                total: 0,
                loading,
                error: Some(err),
                phase: core.phase,
            },
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.core().phase
    }

    /// The spec as last set, whether or not it has been fetched yet
    pub fn spec(&self) -> ViewSpec {
        self.inner.core().spec.clone()
    }

    /// Locally held entity, including optimistic state
    pub fn get(&self, id: &str) -> Option<T> {
        self.inner
            .core()
            .rows
            .iter()
            .find(|row| row.entity.id() == id)
            .map(|row| row.entity.clone())
    }

    pub fn descriptor(&self) -> &CollectionDescriptor<T> {
        &self.inner.descriptor
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.inner.events.subscribe()
    }

    /// Load one entity, served from the cache when possible
    pub async fn detail(&self, id: &str) -> Result<T, CollectionError> {
        let user = self.inner.ready_user()?;
        let scope = self.inner.cache_scope(&user);

        if let Some(cache) = &self.inner.cache {
            if let Some(value) = cache.get(&scope, id) {
                match serde_json::from_value::<T>(value) {
                    Ok(entity) => return Ok(entity),
                    Err(e) => {
                        warn!(collection = self.inner.name(), id, error = %e, "dropping undecodable cache entry");
                        cache.invalidate(&scope, Some(id));
                    }
                }
            }
        }

        let entity = self.inner.gateway.get_by_id(id).await?;
        if let Some(cache) = &self.inner.cache {
            cache.set(&scope, id, serde_json::to_value(&entity)?);
        }
        Ok(entity)
    }
}

impl<T: Entity> ViewInner<T> {
    /// Restart the debounce window; the fetch it ends with runs detached so a
    /// later restart never aborts a request already on the wire
    pub(crate) fn schedule_fetch(self: &Arc<Self>) {
        let mut core = self.core();
        core.cancel_debounce();
        if !core.mounted {
            return;
        }

        let weak = Arc::downgrade(self);
        let delay = self.options.debounce;
        core.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                if let Err(e) = inner.fetch().await {
                    debug!(collection = inner.name(), error = %e, "debounced fetch did not complete");
                }
            });
        }));
    }

    /// Issue one `list` call and apply its response if it is still current
    pub(crate) async fn fetch(&self) -> Result<(), CollectionError> {
        let (seq, query) = {
            let mut core = self.core();
            if !core.mounted {
                debug!(collection = self.name(), "fetch skipped, view not mounted");
                return Ok(());
            }
            let user = self.ready_user()?;
            if core.fetched_scope.as_deref().is_some_and(|scope| scope != user) {
                core.clear_data();
            }
            core.fetched_scope = Some(user);
            core.fetch_on_ready = false;
            core.issued += 1;
            if core.phase != Phase::Fetching {
                let previous = (core.phase, core.error.take());
                core.before_fetch = Some(previous);
            }
            core.phase = Phase::Fetching;
            core.error = None;
            (core.issued, core.spec.list_query(self.options.pagination))
        };

        debug!(collection = self.name(), seq, "issuing list");
        self.emit(ViewEvent::FetchStarted { seq });

        let result = self.gateway.list(&query).await;

        let outcome = {
            let mut core = self.core();
            if !core.mounted || seq != core.issued {
                None
            } else {
                core.before_fetch = None;
                Some(match result {
                    Ok(page) => {
                        core.install(seq, page);
                        core.phase = Phase::Loaded;
                        Ok(core.total)
                    }
                    Err(err) => {
                        core.error = Some(err.clone());
                        core.phase = Phase::Errored;
                        Err(err)
                    }
                })
            }
        };

        match outcome {
            None => {
                debug!(collection = self.name(), seq, "discarding superseded response");
                self.emit(ViewEvent::ResponseDiscarded { seq });
                Ok(())
            }
            Some(Ok(total)) => {
                debug!(collection = self.name(), seq, total, "list applied");
                self.emit(ViewEvent::FetchSucceeded { seq, total });
                Ok(())
            }
            Some(Err(err)) => {
                warn!(collection = self.name(), seq, error = %err, "list failed, keeping previous items");
                self.emit(ViewEvent::FetchFailed {
                    seq,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn on_session(&self, state: SessionState) {
        match state.ready_user() {
            Some(user) => {
                let due = {
                    let core = self.core();
                    core.fetch_on_ready || core.fetched_scope.as_deref() != Some(user)
                };
                if due {
                    info!(collection = self.name(), user, "session ready, fetching");
                    if let Err(e) = self.fetch().await {
                        debug!(collection = self.name(), error = %e, "initial fetch did not complete");
                    }
                }
            }
            None if state == SessionState::SignedOut => {
                {
                    let mut core = self.core();
                    core.cancel_debounce();
                    core.clear_data();
                }
                info!(collection = self.name(), "signed out, view reset");
                self.emit(ViewEvent::Reset);
            }
            None => debug!(collection = self.name(), "session loading"),
        }
    }
}

async fn watch_session<T: Entity>(
    inner: Weak<ViewInner<T>>,
    mut receiver: watch::Receiver<SessionState>,
) {
    loop {
        let state = receiver.borrow_and_update().clone();
        let Some(view) = inner.upgrade() else {
            return;
        };
        view.on_session(state).await;
        drop(view);

        if receiver.changed().await.is_err() {
            return;
        }
    }
}
