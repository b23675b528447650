//! Shared test harness for gateways and collection views
//!
//! Provides patient fixtures, [`ScriptedGateway`] (an in-memory gateway that
//! records calls and can be told to fail or stall), and view helpers.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod gateway_harness;
//! use gateway_harness::*;
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod gateway_contract_tests;

use async_trait::async_trait;
use clinic::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const USER: &str = "doctor-1";

pub fn init() {
    clinic::telemetry::init_tracing("clinic=debug");
}

pub fn patient(id: &str, name: &str, favorite: bool) -> Patient {
    Patient {
        id: id.to_string(),
        name: name.to_string(),
        cpf: "123.456.789-09".to_string(),
        favorite,
        status: "active".to_string(),
        ..Patient::default()
    }
}

/// Five active patients "p1".."p5" named Ana, Bruno, Carla, Davi, Elisa;
/// Bruno and Davi are favorites
pub fn sample_patients() -> Vec<Patient> {
    vec![
        patient("p1", "Ana", false),
        patient("p2", "Bruno", true),
        patient("p3", "Carla", false),
        patient("p4", "Davi", true),
        patient("p5", "Elisa", false),
    ]
}

pub fn patient_store() -> InMemoryGateway<Patient> {
    InMemoryGateway::new(Patient::descriptor())
        .with_rules(Patient::rules())
        .with_records(sample_patients())
        .unwrap()
}

// ---------------------------------------------------------------------------
// ScriptedGateway
// ---------------------------------------------------------------------------

/// Gateway operations, for counting and scripting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    List,
    Get,
    Create,
    Update,
    Remove,
    SetField,
}

/// Wraps an [`InMemoryGateway`]; every call is recorded, and scripted
/// failures and delays are consumed in call order
pub struct ScriptedGateway<T: Entity> {
    inner: InMemoryGateway<T>,
    calls: Mutex<Vec<Op>>,
    list_queries: Mutex<Vec<ListQuery>>,
    failures: Mutex<VecDeque<(Op, CollectionError)>>,
    list_delays: Mutex<VecDeque<Duration>>,
    mutation_delay: Mutex<Option<Duration>>,
    read_lists_early: AtomicBool,
}

impl<T: Entity> ScriptedGateway<T> {
    pub fn new(inner: InMemoryGateway<T>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: Mutex::new(Vec::new()),
            list_queries: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            list_delays: Mutex::new(VecDeque::new()),
            mutation_delay: Mutex::new(None),
            read_lists_early: AtomicBool::new(false),
        })
    }

    pub fn store(&self) -> &InMemoryGateway<T> {
        &self.inner
    }

    /// The next call of `op` fails with `error`
    pub fn fail_next(&self, op: Op, error: CollectionError) {
        self.failures.lock().unwrap().push_back((op, error));
    }

    /// The next `list` call (not yet issued) answers after `delay`
    pub fn delay_next_list(&self, delay: Duration) {
        self.list_delays.lock().unwrap().push_back(delay);
    }

    /// Delayed `list` calls read the store when called rather than when they
    /// answer, like a server whose reply is slow to arrive
    pub fn read_lists_early(&self) {
        self.read_lists_early.store(true, Ordering::SeqCst);
    }

    /// Every mutation answers after `delay`
    pub fn delay_mutations(&self, delay: Duration) {
        *self.mutation_delay.lock().unwrap() = Some(delay);
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    pub fn list_queries(&self) -> Vec<ListQuery> {
        self.list_queries.lock().unwrap().clone()
    }

    pub fn last_list_query(&self) -> Option<ListQuery> {
        self.list_queries.lock().unwrap().last().cloned()
    }

    fn record(&self, op: Op) -> Option<CollectionError> {
        self.calls.lock().unwrap().push(op);
        let mut failures = self.failures.lock().unwrap();
        let index = failures.iter().position(|(o, _)| *o == op)?;
        failures.remove(index).map(|(_, e)| e)
    }

    async fn stall(&self) {
        let delay = *self.mutation_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl<T: Entity> CollectionGateway<T> for ScriptedGateway<T> {
    async fn list(&self, query: &ListQuery) -> Result<ListResult<T>, CollectionError> {
        self.list_queries.lock().unwrap().push(query.clone());
        let failure = self.record(Op::List);
        let delay = self.list_delays.lock().unwrap().pop_front();
        let early = if self.read_lists_early.load(Ordering::SeqCst) {
            Some(self.inner.list(query).await)
        } else {
            None
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match (failure, early) {
            (Some(err), _) => Err(err),
            (None, Some(result)) => result,
            (None, None) => self.inner.list(query).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<T, CollectionError> {
        match self.record(Op::Get) {
            Some(err) => Err(err),
            None => self.inner.get_by_id(id).await,
        }
    }

    async fn create(&self, entity: T) -> Result<T, CollectionError> {
        let failure = self.record(Op::Create);
        self.stall().await;
        match failure {
            Some(err) => Err(err),
            None => self.inner.create(entity).await,
        }
    }

    async fn update(&self, id: &str, patch: &Patch) -> Result<T, CollectionError> {
        let failure = self.record(Op::Update);
        self.stall().await;
        match failure {
            Some(err) => Err(err),
            None => self.inner.update(id, patch).await,
        }
    }

    async fn remove(&self, id: &str) -> Result<(), CollectionError> {
        let failure = self.record(Op::Remove);
        self.stall().await;
        match failure {
            Some(err) => Err(err),
            None => self.inner.remove(id).await,
        }
    }

    async fn set_field(&self, id: &str, field: &str, value: FieldValue) -> Result<T, CollectionError> {
        let failure = self.record(Op::SetField);
        self.stall().await;
        match failure {
            Some(err) => Err(err),
            None => self.inner.set_field(id, field, value).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

pub fn patient_view(
    gateway: Arc<ScriptedGateway<Patient>>,
    session: Arc<SharedSession>,
    options: ViewOptions,
) -> CollectionView<Patient> {
    CollectionView::<Patient>::builder(gateway, session)
        .descriptor(Patient::descriptor())
        .options(options)
        .build()
        .unwrap()
}

/// A mounted patient view over the sample patients, signed in and loaded
pub async fn loaded_view(
    options: ViewOptions,
) -> (CollectionView<Patient>, Arc<ScriptedGateway<Patient>>) {
    init();
    let gateway = ScriptedGateway::new(patient_store());
    let session = Arc::new(SharedSession::signed_in(USER));
    let view = patient_view(gateway.clone(), session, options);
    view.mount();
    settle().await;
    assert_eq!(view.phase(), Phase::Loaded);
    (view, gateway)
}

/// Let spawned tasks and timers run; with a paused clock this advances time
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

pub fn ids(items: &[Patient]) -> Vec<&str> {
    items.iter().map(|p| p.id.as_str()).collect()
}

pub fn names(items: &[Patient]) -> Vec<&str> {
    items.iter().map(|p| p.name.as_str()).collect()
}
