//! Filter/Sort/Page engine
//!
//! Pure functions turning a dataset plus a [`ViewSpec`] into the visible
//! slice:
//!
//! 1. every active filter must pass (AND, match-all sentinels skipped)
//! 2. a non-blank search term must match one of the searchable fields (OR)
//! 3. stable sort on the single sort key, nulls last
//! 4. client-side pagination slices; server-side keeps the gateway's page
//!    and total

pub mod filter;
pub mod sort;

pub use filter::{FilterRule, matches_search};
pub use sort::{collate, compare_keys, compare_values, fold, sort_entities};

use crate::core::entity::Entity;
use crate::core::error::{CollectionError, ValidationError};
use crate::core::query::{FilterSpec, PageSpec, SortSpec, ViewSpec};
use indexmap::IndexMap;

/// What the engine knows about one entity type: its filters and searchable fields
pub struct CollectionDescriptor<T> {
    name: String,
    filters: IndexMap<String, FilterRule<T>>,
    searchable: Vec<String>,
}

impl<T> Clone for CollectionDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            filters: self.filters.clone(),
            searchable: self.searchable.clone(),
        }
    }
}

impl<T: Entity> CollectionDescriptor<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filters: IndexMap::new(),
            searchable: Vec::new(),
        }
    }

    /// Descriptor named after the entity's resource
    pub fn for_entity() -> Self {
        Self::new(T::resource_name())
    }

    /// Register a named filter
    pub fn filter(mut self, name: impl Into<String>, rule: FilterRule<T>) -> Self {
        self.filters.insert(name.into(), rule);
        self
    }

    /// Set the fields a free-text search looks at
    pub fn searchable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn searchable_fields(&self) -> &[String] {
        &self.searchable
    }

    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Reject filter keys this collection does not know
    pub fn validate_filter(&self, spec: &FilterSpec) -> Result<(), CollectionError> {
        match spec.values.keys().find(|key| !self.filters.contains_key(*key)) {
            Some(key) => Err(ValidationError::UnsupportedFilter { key: key.clone() }.into()),
            None => Ok(()),
        }
    }

    /// Whether `entity` passes every active filter and the search
    ///
    /// Unknown filter keys are ignored here; gateways and views reject them
    /// up front with [`validate_filter`](Self::validate_filter).
    pub fn matches(&self, entity: &T, spec: &FilterSpec) -> bool {
        let filters_pass = spec.values.iter().all(|(name, value)| {
            self.filters
                .get(name)
                .is_none_or(|rule| rule.test(entity, value))
        });

        filters_pass
            && spec
                .search_term()
                .is_none_or(|term| matches_search(entity, &self.searchable, term))
    }
}

/// How the engine treats the page spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Items are the whole matching set; slice locally
    Client,
    /// Items are already one page; `total` comes from the gateway
    Server { total: usize },
}

/// The visible items and the total they are a page of
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleSlice<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Filter, then stable-sort
pub fn select<'a, T, I>(
    descriptor: &CollectionDescriptor<T>,
    items: I,
    filter: &FilterSpec,
    sort: Option<&SortSpec>,
) -> Vec<&'a T>
where
    T: Entity,
    I: IntoIterator<Item = &'a T>,
{
    let mut selected: Vec<&T> = items
        .into_iter()
        .filter(|entity| descriptor.matches(entity, filter))
        .collect();
    if let Some(sort) = sort {
        sort_entities(&mut selected, sort);
    }
    selected
}

/// Items on `page`; a page past the end is empty
pub fn paginate<T: Clone>(items: &[&T], page: &PageSpec) -> Vec<T> {
    items
        .iter()
        .skip(page.offset())
        .take(page.per_page)
        .map(|entity| (*entity).clone())
        .collect()
}

/// Compute the visible slice of `items` for `spec`
///
/// Fails only with `InvalidArgument` for an illegal page spec.
pub fn compute_view<'a, T, I>(
    descriptor: &CollectionDescriptor<T>,
    items: I,
    spec: &ViewSpec,
    pagination: Pagination,
) -> Result<VisibleSlice<T>, CollectionError>
where
    T: Entity,
    I: IntoIterator<Item = &'a T>,
{
    spec.page.validate()?;
    let selected = select(descriptor, items, &spec.filter, spec.sort.as_ref());

    Ok(match pagination {
        Pagination::Client => VisibleSlice {
            total: selected.len(),
            items: paginate(&selected, &spec.page),
        },
        Pagination::Server { total } => VisibleSlice {
            items: selected.into_iter().cloned().collect(),
            total,
        },
    })
}
