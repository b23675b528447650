//! Entity trait defining the core abstraction for listed records

use crate::core::error::{CollectionError, FieldValidationError, ValidationError};
use crate::core::field::FieldValue;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Prefix of ids synthesized locally for optimistic creates
pub const TEMP_ID_PREFIX: &str = "local-";

/// A partial payload: field path to new value, in application order
pub type Patch = IndexMap<String, FieldValue>;

/// Base trait for every record a collection view manages.
///
/// An entity has a string `id`, unique and immutable for the lifetime of a
/// view, and a payload whose fields are reachable by dotted key path
/// (e.g. `"address.city"`).
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// The plural resource name (e.g., "patients", "invoices")
    fn resource_name() -> &'static str;

    /// Get the unique identifier for this entity instance
    fn id(&self) -> &str;

    /// Replace the identifier. Used for server-assigned and temporary ids only.
    fn assign_id(&mut self, id: String);

    /// Get the value at a dotted key path
    ///
    /// `None` means the path does not exist; an existing but empty optional
    /// field is `Some(FieldValue::Null)`.
    fn field_value(&self, path: &str) -> Option<FieldValue>;

    /// Set the value at a dotted key path
    fn set_field_value(&mut self, path: &str, value: FieldValue) -> Result<(), CollectionError>;

    /// Apply every entry of a patch, reporting all failing fields at once
    ///
    /// On error the entity may be partially patched; callers patch a clone.
    fn apply_patch(&mut self, patch: &Patch) -> Result<(), CollectionError> {
        let mut errors = Vec::new();
        for (path, value) in patch {
            if let Err(e) = self.set_field_value(path, value.clone()) {
                match e {
                    CollectionError::Validation(ValidationError::FieldError { field, message }) => {
                        errors.push(FieldValidationError { field, message })
                    }
                    other => return Err(other),
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::FieldErrors(errors).into())
        }
    }

    /// Whether this instance only exists locally, pending a create
    fn is_temporary(&self) -> bool {
        self.id().starts_with(TEMP_ID_PREFIX)
    }
}

/// Build a fresh temporary id for an optimistic create
pub fn temporary_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4())
}

/// Split `"address.city"` into `("address", "city")`; a plain key has an empty rest
pub fn split_path(path: &str) -> (&str, &str) {
    match path.split_once('.') {
        Some((head, rest)) => (head, rest),
        None => (path, ""),
    }
}

/// Key-path access into a value
///
/// Scalars answer only the empty path. Structs implement it with
/// [`impl_field_access!`](crate::impl_field_access) and delegate the rest of
/// the path to their fields. Errors are plain messages; the entity attaches
/// the full path.
pub trait FieldAccess {
    fn get_path(&self, path: &str) -> Option<FieldValue>;

    fn set_path(&mut self, path: &str, value: FieldValue) -> Result<(), String>;
}

fn leaf_only(path: &str) -> Result<(), String> {
    if path.is_empty() {
        Ok(())
    } else {
        Err(format!("scalar field has no sub-field '{}'", path))
    }
}

fn mismatch(expected: &str, value: &FieldValue) -> String {
    format!("expected {}, got {}", expected, value.kind())
}

impl FieldAccess for String {
    fn get_path(&self, path: &str) -> Option<FieldValue> {
        path.is_empty().then(|| FieldValue::String(self.clone()))
    }

    fn set_path(&mut self, path: &str, value: FieldValue) -> Result<(), String> {
        leaf_only(path)?;
        match value {
            FieldValue::String(s) => {
                *self = s;
                Ok(())
            }
            other => Err(mismatch("string", &other)),
        }
    }
}

impl FieldAccess for i64 {
    fn get_path(&self, path: &str) -> Option<FieldValue> {
        path.is_empty().then_some(FieldValue::Integer(*self))
    }

    fn set_path(&mut self, path: &str, value: FieldValue) -> Result<(), String> {
        leaf_only(path)?;
        match value {
            FieldValue::Integer(i) => {
                *self = i;
                Ok(())
            }
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FieldAccess for f64 {
    fn get_path(&self, path: &str) -> Option<FieldValue> {
        path.is_empty().then_some(FieldValue::Float(*self))
    }

    fn set_path(&mut self, path: &str, value: FieldValue) -> Result<(), String> {
        leaf_only(path)?;
        match value.as_f64() {
            Some(f) => {
                *self = f;
                Ok(())
            }
            None => Err(mismatch("number", &value)),
        }
    }
}

impl FieldAccess for bool {
    fn get_path(&self, path: &str) -> Option<FieldValue> {
        path.is_empty().then_some(FieldValue::Boolean(*self))
    }

    fn set_path(&mut self, path: &str, value: FieldValue) -> Result<(), String> {
        leaf_only(path)?;
        match value {
            FieldValue::Boolean(b) => {
                *self = b;
                Ok(())
            }
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl FieldAccess for Uuid {
    fn get_path(&self, path: &str) -> Option<FieldValue> {
        path.is_empty().then_some(FieldValue::Uuid(*self))
    }

    fn set_path(&mut self, path: &str, value: FieldValue) -> Result<(), String> {
        leaf_only(path)?;
        match value {
            FieldValue::Uuid(u) => *self = u,
            FieldValue::String(s) => {
                *self = Uuid::parse_str(&s).map_err(|e| format!("invalid uuid: {}", e))?
            }
            other => return Err(mismatch("uuid", &other)),
        }
        Ok(())
    }
}

impl FieldAccess for DateTime<Utc> {
    fn get_path(&self, path: &str) -> Option<FieldValue> {
        path.is_empty().then_some(FieldValue::DateTime(*self))
    }

    fn set_path(&mut self, path: &str, value: FieldValue) -> Result<(), String> {
        leaf_only(path)?;
        match value {
            FieldValue::DateTime(d) => *self = d,
            FieldValue::String(s) => {
                *self = DateTime::parse_from_rfc3339(&s)
                    .map_err(|e| format!("invalid datetime: {}", e))?
                    .with_timezone(&Utc)
            }
            other => return Err(mismatch("datetime", &other)),
        }
        Ok(())
    }
}

impl<V: FieldAccess + Default> FieldAccess for Option<V> {
    fn get_path(&self, path: &str) -> Option<FieldValue> {
        match self {
            Some(inner) => inner.get_path(path),
            None if path.is_empty() => Some(FieldValue::Null),
            // An absent parent makes every nested path null rather than unknown
            None => {
                let probe = V::default();
                probe.get_path(path).map(|_| FieldValue::Null)
            }
        }
    }

    fn set_path(&mut self, path: &str, value: FieldValue) -> Result<(), String> {
        if path.is_empty() && value.is_null() {
            *self = None;
            return Ok(());
        }
        let was_none = self.is_none();
        let mut inner = self.take().unwrap_or_default();
        let result = inner.set_path(path, value);
        if result.is_ok() || !was_none {
            *self = Some(inner);
        }
        result
    }
}

/// Implement [`FieldAccess`] for a struct whose listed fields implement it
#[macro_export]
macro_rules! impl_field_access {
    ($type:ty { $($field:ident),* $(,)? }) => {
        impl $crate::core::entity::FieldAccess for $type {
            fn get_path(&self, path: &str) -> Option<$crate::core::field::FieldValue> {
                let (head, rest) = $crate::core::entity::split_path(path);
                match head {
                    $(stringify!($field) => $crate::core::entity::FieldAccess::get_path(&self.$field, rest),)*
                    _ => None,
                }
            }

            fn set_path(
                &mut self,
                path: &str,
                value: $crate::core::field::FieldValue,
            ) -> Result<(), String> {
                let (head, rest) = $crate::core::entity::split_path(path);
                match head {
                    $(stringify!($field) => $crate::core::entity::FieldAccess::set_path(&mut self.$field, rest, value),)*
                    _ => Err(format!("unknown field '{}'", head)),
                }
            }
        }
    };
}
