//! Filter, sort and page specifications, plus their wire forms

use crate::core::error::CollectionError;
use crate::core::field::FieldValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

/// Single-column sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Dotted field path
    pub key: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Parse `field`, `field:asc` or `field:desc`
    pub fn parse(expr: &str) -> Result<Self, CollectionError> {
        let (key, direction) = match expr.split_once(':') {
            Some((key, "asc")) => (key, SortDirection::Ascending),
            Some((key, "desc")) => (key, SortDirection::Descending),
            Some((_, other)) => {
                return Err(CollectionError::invalid_argument(
                    "sort",
                    format!("unknown direction '{}'", other),
                ));
            }
            None => (expr, SortDirection::Ascending),
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(CollectionError::invalid_argument("sort", "empty sort key"));
        }
        Ok(Self {
            key: key.to_string(),
            direction,
        })
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Ascending => write!(f, "{}:asc", self.key),
            SortDirection::Descending => write!(f, "{}:desc", self.key),
        }
    }
}

/// Page number (starts at 1) and page size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    pub page: usize,
    pub per_page: usize,
}

impl PageSpec {
    pub fn new(page: usize, per_page: usize) -> Result<Self, CollectionError> {
        let spec = Self { page, per_page };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), CollectionError> {
        if self.per_page == 0 {
            return Err(CollectionError::invalid_argument(
                "per_page",
                "must be greater than zero",
            ));
        }
        if self.page == 0 {
            return Err(CollectionError::invalid_argument("page", "pages start at 1"));
        }
        Ok(())
    }

    /// Index of the first item on this page
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

/// Where slicing happens, fixed per entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    /// The gateway returns every matching entity; the engine slices
    #[default]
    Client,
    /// The gateway returns one page plus the total count
    Server,
}

/// Named filter values plus the free-text search
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub values: IndexMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn clear(&mut self, name: &str) -> Option<FieldValue> {
        self.values.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// The trimmed search term, if any is left after trimming
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }
}

/// Everything a view holds to describe what it shows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewSpec {
    pub filter: FilterSpec,
    pub sort: Option<SortSpec>,
    pub page: PageSpec,
}

impl ViewSpec {
    /// The gateway request for this spec; client-side mode fetches unpaged
    pub fn list_query(&self, mode: PaginationMode) -> ListQuery {
        ListQuery {
            filter: self.filter.clone(),
            sort: self.sort.clone(),
            page: match mode {
                PaginationMode::Client => None,
                PaginationMode::Server => Some(self.page),
            },
        }
    }
}

/// Arguments of a gateway `list` call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListQuery {
    pub filter: FilterSpec,
    pub sort: Option<SortSpec>,
    /// `None` asks for every matching entity
    pub page: Option<PageSpec>,
}

/// Result of a gateway `list` call
#[derive(Debug, Clone, PartialEq)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResult<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Query string parameters for remote list endpoints
///
/// ```text
/// GET /patients?page=2&limit=10
/// GET /patients?filter={"status":"active"}&search=maria&sort=name:asc
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct QueryParams {
    /// Page number (starts at 1); absent for unpaged requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,

    /// Number of items per page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Filters as a JSON object string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Free-text search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    /// `field:asc` or `field:desc`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

impl QueryParams {
    pub fn from_query(query: &ListQuery) -> Result<Self, CollectionError> {
        let filter = if query.filter.values.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&query.filter.values)?)
        };

        Ok(Self {
            page: query.page.map(|p| p.page),
            limit: query.page.map(|p| p.per_page),
            filter,
            search: query.filter.search_term().map(str::to_string),
            sort: query.sort.as_ref().map(ToString::to_string),
        })
    }

    /// Rebuild the list query these parameters describe
    pub fn to_query(&self) -> Result<ListQuery, CollectionError> {
        let values = match &self.filter {
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                CollectionError::invalid_argument("filter", format!("invalid JSON: {}", e))
            })?,
            None => IndexMap::new(),
        };
        let page = match (self.page, self.limit) {
            (None, None) => None,
            (page, limit) => Some(PageSpec::new(
                page.unwrap_or(1),
                limit.unwrap_or(PageSpec::default().per_page),
            )?),
        };

        Ok(ListQuery {
            filter: FilterSpec {
                values,
                search: self.search.clone(),
            },
            sort: self.sort.as_deref().map(SortSpec::parse).transpose()?,
            page,
        })
    }
}

/// Paginated response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    /// The page of data
    pub data: Vec<T>,

    /// Pagination metadata
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginationMeta {
    /// Current page number (starts at 1)
    pub page: usize,

    /// Number of items per page
    pub limit: usize,

    /// Total number of items (after filters)
    pub total: usize,

    /// Total number of pages
    pub total_pages: usize,

    /// Whether there is a next page
    pub has_next: bool,

    /// Whether there is a previous page
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        // Avoid division by zero
        let limit = limit.max(1);
        let page = page.max(1);
        let total_pages = if total == 0 { 0 } else { total.div_ceil(limit) };
        let start = (page - 1).saturating_mul(limit);

        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: start.saturating_add(limit) < total,
            has_prev: page > 1,
        }
    }
}
