//! # Clinic Views
//!
//! Client-side list state for remotely stored collections: filtered, sorted
//! and paginated views that debounce spec changes, drop stale responses and
//! apply mutations optimistically with exact rollback.
//!
//! ## Features
//!
//! - **Gateway abstraction**: list/get/create/update/remove/set_field over any backend
//! - **Filter/Sort/Page engine**: AND filters with match-all sentinels, OR search,
//!   stable single-key sort with nulls last, client- or server-side paging
//! - **Debounced queries**: one `list` call per burst of spec changes
//! - **Stale-response rejection**: only the latest request's result is shown
//! - **Optimistic mutations**: immediate local patch, reconcile or roll back
//! - **Session gating**: nothing is fetched until a user is signed in
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clinic::prelude::*;
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(InMemoryGateway::new(Patient::descriptor()));
//! let session = Arc::new(SharedSession::signed_in("doctor-1"));
//!
//! let view = CollectionView::builder(gateway, session)
//!     .descriptor(Patient::descriptor())
//!     .build()?;
//! view.mount();
//!
//! view.set_filter("status", "active")?;
//! view.set_search("maria");
//!
//! let state = view.snapshot();
//! println!("{} of {} patients", state.items.len(), state.total);
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod entities;
pub mod storage;
pub mod telemetry;
pub mod view;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Traits ===
    pub use crate::core::{
        cache::{InMemoryCache, ResponseCache},
        entity::{Entity, FieldAccess, Patch},
        error::{
            CollectionError, CollectionResult, ErrorResponse, FieldValidationError,
            ValidationError,
        },
        events::{EventBus, EventEnvelope, MutationKind, ViewEvent},
        field::{FieldFormat, FieldValue},
        gateway::CollectionGateway,
        query::{
            FilterSpec, ListQuery, ListResult, PageSpec, PaginationMode, SortDirection, SortSpec,
            ViewSpec,
        },
        session::{SessionProvider, SessionState, SharedSession},
        validation::{FieldRules, validators},
    };

    // === Macros ===
    pub use crate::{impl_entity, impl_field_access};

    // === Engine ===
    pub use crate::engine::{CollectionDescriptor, FilterRule, Pagination, VisibleSlice, compute_view};

    // === Views ===
    pub use crate::view::{CollectionView, CollectionViewBuilder, Phase, ViewOptions, ViewState};

    // === Entities ===
    pub use crate::entities::{Address, Invoice, InvoiceStatus, Patient, Record, User};

    // === Storage ===
    #[cfg(feature = "in-memory")]
    pub use crate::storage::InMemoryGateway;
    #[cfg(feature = "http")]
    pub use crate::storage::RestGateway;

    // === Config ===
    pub use crate::config::{CollectionConfig, CollectionsConfig, ConfigError};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use uuid::Uuid;
}
