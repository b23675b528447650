//! Response cache shared by the views of one process
//!
//! One cache is created per process and passed to every view that needs it.
//! Keys live in a scope (typically `"<collection>:<user>"`) so a whole scope
//! can be dropped at once.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Cache abstraction injected into views
pub trait ResponseCache: Send + Sync {
    fn get(&self, scope: &str, key: &str) -> Option<Value>;

    fn set(&self, scope: &str, key: &str, value: Value);

    /// Drop one key, or the whole scope when `key` is `None`
    fn invalidate(&self, scope: &str, key: Option<&str>);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory cache with an optional time-to-live
///
/// Uses RwLock for thread-safe access.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, HashMap<String, CacheEntry>>>>,
    ttl: Option<Duration>,
}

impl InMemoryCache {
    /// Entries never expire
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries expire `ttl` after being set
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::default(),
            ttl: Some(ttl),
        }
    }

    /// Number of live entries in a scope
    pub fn len(&self, scope: &str) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .map(|entries| {
                entries
                    .get(scope)
                    .map(|keys| keys.values().filter(|e| !e.is_expired(now)).count())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

impl ResponseCache for InMemoryCache {
    fn get(&self, scope: &str, key: &str) -> Option<Value> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(scope)?.get(key)?;
        if entry.is_expired(Utc::now()) {
            return None;
        }
        Some(entry.value.clone())
    }

    fn set(&self, scope: &str, key: &str, value: Value) {
        let Ok(mut entries) = self.entries.write() else {
            tracing::warn!(scope, key, "cache lock poisoned, skipping set");
            return;
        };
        let entry = CacheEntry {
            value,
            expires_at: self.ttl.map(|ttl| Utc::now() + ttl),
        };
        entries
            .entry(scope.to_string())
            .or_default()
            .insert(key.to_string(), entry);
    }

    fn invalidate(&self, scope: &str, key: Option<&str>) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        match key {
            Some(key) => {
                if let Some(keys) = entries.get_mut(scope) {
                    keys.remove(key);
                }
            }
            None => {
                entries.remove(scope);
            }
        }
    }
}
