//! Configuration loading and management
//!
//! ```yaml
//! collections:
//!   - name: patients
//!     pagination: client
//!     per_page: 10
//!     default_sort: name:asc
//!     searchable_fields: [name, cpf, email, phone]
//!   - name: invoices
//!     pagination: server
//!     debounce_ms: 500
//!     cache_ttl_secs: 1800
//! ```

use crate::core::cache::InMemoryCache;
use crate::core::query::{PaginationMode, SortSpec};
use crate::view::{DEFAULT_DEBOUNCE, ViewOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration problems found by [`CollectionsConfig::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("collection '{0}' is declared more than once")]
    DuplicateCollection(String),
    #[error("collection '{0}': per_page must be greater than zero")]
    ZeroPerPage(String),
    #[error("collection '{collection}': invalid default_sort '{sort}'")]
    InvalidSort { collection: String, sort: String },
    #[error("collection name must not be empty")]
    EmptyName,
}

/// Settings for one listed collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Resource name (e.g., "patients")
    pub name: String,

    #[serde(default)]
    pub pagination: PaginationMode,

    #[serde(default = "default_per_page")]
    pub per_page: usize,

    /// Debounce window for spec changes, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// `field:asc` or `field:desc`
    #[serde(default)]
    pub default_sort: Option<String>,

    /// Informational; the searchable fields come from the entity descriptor
    #[serde(default)]
    pub searchable_fields: Vec<String>,

    /// How long detail lookups stay cached; unset caches until invalidated
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

fn default_per_page() -> usize {
    20
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pagination: PaginationMode::default(),
            per_page: default_per_page(),
            debounce_ms: default_debounce_ms(),
            default_sort: None,
            searchable_fields: Vec::new(),
            cache_ttl_secs: None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.per_page == 0 {
            return Err(ConfigError::ZeroPerPage(self.name.clone()));
        }
        if let Some(sort) = &self.default_sort {
            SortSpec::parse(sort).map_err(|_| ConfigError::InvalidSort {
                collection: self.name.clone(),
                sort: sort.clone(),
            })?;
        }
        Ok(())
    }

    /// View options for this collection
    pub fn view_options(&self) -> Result<ViewOptions, ConfigError> {
        self.validate()?;
        let mut options = ViewOptions::default()
            .pagination(self.pagination)
            .per_page(self.per_page)
            .debounce(Duration::from_millis(self.debounce_ms));
        if let Some(sort) = &self.default_sort {
            // validated above
            if let Ok(sort) = SortSpec::parse(sort) {
                options = options.default_sort(sort);
            }
        }
        Ok(options)
    }

    /// Detail cache honoring `cache_ttl_secs`
    pub fn cache(&self) -> InMemoryCache {
        match self.cache_ttl_secs {
            Some(secs) => InMemoryCache::with_ttl(chrono::Duration::seconds(secs as i64)),
            None => InMemoryCache::new(),
        }
    }
}

/// Complete configuration for the collection views of an app
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionsConfig {
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

impl CollectionsConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("loading {}", path.display()))
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for collection in &self.collections {
            collection.validate()?;
            if !seen.insert(collection.name.as_str()) {
                return Err(ConfigError::DuplicateCollection(collection.name.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Settings for `name`, or the defaults when it is not configured
    pub fn collection(&self, name: &str) -> CollectionConfig {
        self.get(name)
            .cloned()
            .unwrap_or_else(|| CollectionConfig::new(name))
    }

    /// Merge several configurations; a later entry for the same collection
    /// replaces the earlier one in place
    pub fn merge(configs: Vec<CollectionsConfig>) -> Self {
        let mut merged: Vec<CollectionConfig> = Vec::new();
        for collection in configs.into_iter().flat_map(|c| c.collections) {
            match merged.iter_mut().find(|c| c.name == collection.name) {
                Some(existing) => *existing = collection,
                None => merged.push(collection),
            }
        }
        Self {
            collections: merged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::SortDirection;

    const YAML: &str = r#"
collections:
  - name: patients
    per_page: 10
    default_sort: name:asc
    searchable_fields: [name, cpf]
  - name: invoices
    pagination: server
    debounce_ms: 500
    cache_ttl_secs: 1800
"#;

    #[test]
    fn test_defaults_apply() {
        let config = CollectionsConfig::from_yaml_str(YAML).unwrap();
        let patients = config.get("patients").unwrap();
        assert_eq!(patients.pagination, PaginationMode::Client);
        assert_eq!(patients.debounce_ms, 300);

        let invoices = config.get("invoices").unwrap();
        assert_eq!(invoices.per_page, 20);
        assert_eq!(invoices.pagination, PaginationMode::Server);
    }

    #[test]
    fn test_view_options() {
        let config = CollectionsConfig::from_yaml_str(YAML).unwrap();
        let options = config.collection("patients").view_options().unwrap();
        assert_eq!(options.per_page, 10);
        let sort = options.default_sort.unwrap();
        assert_eq!(sort.key, "name");
        assert_eq!(sort.direction, SortDirection::Ascending);

        let options = config.collection("invoices").view_options().unwrap();
        assert_eq!(options.debounce, Duration::from_millis(500));
    }

    #[test]
    fn test_unconfigured_collection_uses_defaults() {
        let config = CollectionsConfig::default();
        let users = config.collection("users");
        assert_eq!(users.per_page, 20);
        assert_eq!(users.debounce_ms, 300);
    }

    #[test]
    fn test_validation_errors() {
        let zero = CollectionsConfig {
            collections: vec![CollectionConfig {
                per_page: 0,
                ..CollectionConfig::new("patients")
            }],
        };
        assert_eq!(
            zero.validate(),
            Err(ConfigError::ZeroPerPage("patients".into()))
        );

        let duplicate = CollectionsConfig {
            collections: vec![CollectionConfig::new("users"), CollectionConfig::new("users")],
        };
        assert_eq!(
            duplicate.validate(),
            Err(ConfigError::DuplicateCollection("users".into()))
        );

        let err = CollectionsConfig::from_yaml_str("collections:\n  - name: users\n    per_page: 0\n")
            .unwrap_err();
        assert!(err.to_string().contains("per_page"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = CollectionsConfig::from_yaml_str(YAML).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = CollectionsConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
