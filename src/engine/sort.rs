//! Value comparison, collation and stable single-key sorting

use crate::core::entity::Entity;
use crate::core::field::FieldValue;
use crate::core::query::{SortDirection, SortSpec};
use std::cmp::Ordering;

/// Lowercase and strip Latin diacritics, so "Álvaro" collates next to "alvaro"
pub fn fold(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'ç' => 'c',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ñ' => 'n',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ý' | 'ÿ' => 'y',
            other => other,
        })
        .collect()
}

/// Collation order for strings: folded text first, raw text breaks ties
pub fn collate(a: &str, b: &str) -> Ordering {
    fold(a).cmp(&fold(b)).then_with(|| a.cmp(b))
}

fn type_rank(value: &FieldValue) -> u8 {
    match value {
        FieldValue::Boolean(_) => 0,
        FieldValue::Integer(_) | FieldValue::Float(_) => 1,
        FieldValue::String(_) => 2,
        FieldValue::Uuid(_) => 3,
        FieldValue::DateTime(_) => 4,
        FieldValue::Null => 5,
    }
}

/// Total order over field values
///
/// Numbers compare numerically across integer/float, strings by
/// [`collate`]. Values of different kinds order by kind.
pub fn compare_values(a: &FieldValue, b: &FieldValue) -> Ordering {
    match (a, b) {
        (FieldValue::String(x), FieldValue::String(y)) => collate(x, y),
        (FieldValue::Boolean(x), FieldValue::Boolean(y)) => x.cmp(y),
        (FieldValue::Uuid(x), FieldValue::Uuid(y)) => x.cmp(y),
        (FieldValue::DateTime(x), FieldValue::DateTime(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => type_rank(a).cmp(&type_rank(b)),
        },
    }
}

/// Compare two sort keys; missing and null keys go last in either direction
pub fn compare_keys(
    a: Option<&FieldValue>,
    b: Option<&FieldValue>,
    direction: SortDirection,
) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let ordering = compare_values(x, y);
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        }
    }
}

/// Stable sort by one key; ties keep their input order
pub fn sort_entities<T: Entity>(items: &mut Vec<&T>, spec: &SortSpec) {
    let mut keyed: Vec<(Option<FieldValue>, &T)> = items
        .drain(..)
        .map(|entity| (entity.field_value(&spec.key), entity))
        .collect();
    // slice::sort_by is stable
    keyed.sort_by(|(a, _), (b, _)| compare_keys(a.as_ref(), b.as_ref(), spec.direction));
    items.extend(keyed.into_iter().map(|(_, entity)| entity));
}
