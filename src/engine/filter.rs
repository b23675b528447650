//! Filter predicates and free-text search

use crate::core::entity::Entity;
use crate::core::field::FieldValue;
use crate::engine::sort::{compare_values, fold};
use std::cmp::Ordering;
use std::sync::Arc;

type Predicate<T> = Arc<dyn Fn(&T, &FieldValue) -> bool + Send + Sync>;

/// A named filter's predicate and its optional match-all sentinel
///
/// A filter whose value is `Null` or equal to the sentinel (e.g.
/// `status == "all"`) is inactive and skipped.
pub struct FilterRule<T> {
    predicate: Predicate<T>,
    match_all: Option<FieldValue>,
}

impl<T> Clone for FilterRule<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
            match_all: self.match_all.clone(),
        }
    }
}

impl<T: Entity> FilterRule<T> {
    /// Filter with an arbitrary predicate
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&T, &FieldValue) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            match_all: None,
        }
    }

    /// Field at `path` equals the filter value (numbers compare numerically,
    /// strings by collation)
    pub fn field_equals(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(move |entity: &T, value: &FieldValue| {
            entity
                .field_value(&path)
                .filter(|v| !v.is_null())
                .is_some_and(|v| compare_values(&v, value) == Ordering::Equal)
        })
    }

    /// Field at `path` contains the filter text, case- and accent-insensitively
    pub fn field_contains(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(move |entity: &T, value: &FieldValue| {
            let Some(needle) = value.search_text() else {
                return false;
            };
            entity
                .field_value(&path)
                .and_then(|v| v.search_text())
                .is_some_and(|hay| fold(&hay).contains(&fold(&needle)))
        })
    }

    /// Field at `path` is greater than or equal to the filter value
    pub fn field_at_least(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(move |entity: &T, value: &FieldValue| {
            entity
                .field_value(&path)
                .filter(|v| !v.is_null())
                .is_some_and(|v| compare_values(&v, value) != Ordering::Less)
        })
    }

    /// Field at `path` is less than or equal to the filter value
    pub fn field_at_most(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(move |entity: &T, value: &FieldValue| {
            entity
                .field_value(&path)
                .filter(|v| !v.is_null())
                .is_some_and(|v| compare_values(&v, value) != Ordering::Greater)
        })
    }

    /// Treat `sentinel` as "no filtering"
    pub fn with_match_all(mut self, sentinel: impl Into<FieldValue>) -> Self {
        self.match_all = Some(sentinel.into());
        self
    }

    pub fn is_active(&self, value: &FieldValue) -> bool {
        !value.is_null() && self.match_all.as_ref() != Some(value)
    }

    /// Whether `entity` passes; inactive values pass everything
    pub fn test(&self, entity: &T, value: &FieldValue) -> bool {
        !self.is_active(value) || (self.predicate)(entity, value)
    }
}

/// Case- and accent-insensitive substring match on any of `fields`
pub fn matches_search<T: Entity>(entity: &T, fields: &[String], term: &str) -> bool {
    let needle = fold(term);
    fields.iter().any(|field| {
        entity
            .field_value(field)
            .and_then(|v| v.search_text())
            .is_some_and(|hay| fold(&hay).contains(&needle))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Record;
    use serde_json::json;

    fn patient() -> Record {
        Record::new(
            "1",
            json!({"name": "Conceição", "cpf": "123", "status": "active", "age": 41}),
        )
    }

    #[test]
    fn test_field_equals() {
        let rule = FilterRule::<Record>::field_equals("status");
        assert!(rule.test(&patient(), &FieldValue::from("active")));
        assert!(!rule.test(&patient(), &FieldValue::from("inactive")));
    }

    #[test]
    fn test_match_all_sentinel_and_null_are_inactive() {
        let rule = FilterRule::<Record>::field_equals("status").with_match_all("all");
        assert!(!rule.is_active(&FieldValue::from("all")));
        assert!(!rule.is_active(&FieldValue::Null));
        assert!(rule.test(&patient(), &FieldValue::from("all")));
        assert!(rule.test(&patient(), &FieldValue::Null));
    }

    #[test]
    fn test_range_rules() {
        let min = FilterRule::<Record>::field_at_least("age");
        let max = FilterRule::<Record>::field_at_most("age");
        assert!(min.test(&patient(), &FieldValue::Integer(41)));
        assert!(!min.test(&patient(), &FieldValue::Float(41.5)));
        assert!(max.test(&patient(), &FieldValue::Integer(50)));
        assert!(!max.test(&patient(), &FieldValue::Integer(18)));
    }

    #[test]
    fn test_search_or_matching() {
        let fields = vec!["name".to_string(), "cpf".to_string()];
        assert!(matches_search(&patient(), &fields, "123"));
        assert!(matches_search(&patient(), &fields, "conceicao"));
        assert!(matches_search(&patient(), &fields, "CEIÇ"));
        assert!(!matches_search(&patient(), &fields, "active"));
    }

    #[test]
    fn test_field_contains() {
        let rule = FilterRule::<Record>::field_contains("name");
        assert!(rule.test(&patient(), &FieldValue::from("ONCE")));
        assert!(!rule.test(&patient(), &FieldValue::from("maria")));
    }
}
