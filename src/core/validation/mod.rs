//! Declarative payload validation
//!
//! Gateways hold a [`FieldRules`] set and run it on every payload they are
//! about to store, so callers learn about every invalid field at once.

pub mod validators;

use crate::core::entity::Entity;
use crate::core::error::{CollectionError, FieldValidationError, ValidationError};
use crate::core::field::FieldValue;
use std::sync::Arc;

type Validator = Arc<dyn Fn(&str, &FieldValue) -> Result<(), String> + Send + Sync>;

/// Ordered list of (field path, validator)
#[derive(Clone, Default)]
pub struct FieldRules {
    rules: Vec<(String, Validator)>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator for a field path
    pub fn rule<F>(mut self, field: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&str, &FieldValue) -> Result<(), String> + Send + Sync + 'static,
    {
        self.rules.push((field.into(), Arc::new(validator)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule; unset paths are validated as `Null`
    pub fn validate<T: Entity>(&self, entity: &T) -> Result<(), CollectionError> {
        let errors: Vec<FieldValidationError> = self
            .rules
            .iter()
            .filter_map(|(field, validator)| {
                let value = entity.field_value(field).unwrap_or(FieldValue::Null);
                validator(field, &value)
                    .err()
                    .map(|message| FieldValidationError::new(field.clone(), message))
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::FieldErrors(errors).into())
        }
    }
}

impl std::fmt::Debug for FieldRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|(field, _)| field))
            .finish()
    }
}
