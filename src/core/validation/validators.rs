//! Reusable field validators
//!
//! Each validator receives the field path and its current value (`Null` when
//! the path is unset) and returns a message on failure.

use crate::core::field::{FieldFormat, FieldValue};

/// Validator: field is required (not null, not a blank string)
pub fn required() -> impl Fn(&str, &FieldValue) -> Result<(), String> + Send + Sync + Clone {
    |field: &str, value: &FieldValue| match value {
        FieldValue::Null => Err(format!("'{}' is required", field)),
        FieldValue::String(s) if s.trim().is_empty() => Err(format!("'{}' is required", field)),
        _ => Ok(()),
    }
}

/// Validator: number must be positive
pub fn positive() -> impl Fn(&str, &FieldValue) -> Result<(), String> + Send + Sync + Clone {
    |field: &str, value: &FieldValue| match value.as_f64() {
        Some(num) if num <= 0.0 => Err(format!(
            "'{}' must be positive (value: {})",
            field, num
        )),
        _ => Ok(()),
    }
}

/// Validator: string length must be within range
pub fn string_length(
    min: usize,
    max: usize,
) -> impl Fn(&str, &FieldValue) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &FieldValue| {
        let Some(s) = value.as_string() else {
            return Ok(());
        };
        let len = s.chars().count();
        if len < min {
            Err(format!(
                "'{}' must have at least {} characters (currently: {})",
                field, min, len
            ))
        } else if len > max {
            Err(format!(
                "'{}' must not exceed {} characters (currently: {})",
                field, max, len
            ))
        } else {
            Ok(())
        }
    }
}

/// Validator: value must be in allowed list
pub fn in_list(
    allowed: Vec<String>,
) -> impl Fn(&str, &FieldValue) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &FieldValue| match value.as_string() {
        Some(s) if !allowed.iter().any(|a| a == s) => Err(format!(
            "'{}' must be one of {:?} (value: {})",
            field, allowed, s
        )),
        _ => Ok(()),
    }
}

/// Validator: string must match a format; nulls pass
pub fn format(
    format: FieldFormat,
) -> impl Fn(&str, &FieldValue) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &FieldValue| {
        if value.is_null() || format.validate(value) {
            Ok(())
        } else {
            Err(format!("'{}' is not a valid {}", field, format.label()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_null_and_blank() {
        let v = required();
        assert!(v("name", &FieldValue::Null).is_err());
        assert!(v("name", &FieldValue::from("   ")).is_err());
        assert!(v("name", &FieldValue::from("Ana")).is_ok());
        assert!(v("favorite", &FieldValue::Boolean(false)).is_ok());
    }

    #[test]
    fn test_positive() {
        let v = positive();
        let err = v("amount", &FieldValue::Float(-5.0)).unwrap_err();
        assert!(err.contains("positive"));
        assert!(v("amount", &FieldValue::Integer(0)).is_err());
        assert!(v("amount", &FieldValue::Float(150.0)).is_ok());
        assert!(v("amount", &FieldValue::from("n/a")).is_ok());
    }

    #[test]
    fn test_string_length_counts_chars() {
        let v = string_length(2, 5);
        assert!(v("name", &FieldValue::from("Zé")).is_ok());
        assert!(v("name", &FieldValue::from("J")).is_err());
        assert!(v("name", &FieldValue::from("Joaquim")).is_err());
    }

    #[test]
    fn test_in_list() {
        let v = in_list(vec!["active".into(), "inactive".into()]);
        assert!(v("status", &FieldValue::from("active")).is_ok());
        assert!(v("status", &FieldValue::from("archived")).is_err());
    }

    #[test]
    fn test_format_allows_null() {
        let v = format(FieldFormat::Email);
        assert!(v("email", &FieldValue::Null).is_ok());
        assert!(v("email", &FieldValue::from("ana@clinic.com")).is_ok());
        let err = v("email", &FieldValue::from("ana")).unwrap_err();
        assert!(err.contains("email"));
    }
}
