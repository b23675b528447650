//! Typed error handling for collection views
//!
//! Every failure a gateway, the engine or a view can report is a
//! [`CollectionError`]. Callers match on the variant to decide what to do:
//!
//! - [`CollectionError::Network`]: transport failure, retryable
//! - [`CollectionError::Validation`]: caller data rejected, fix and resubmit
//! - [`CollectionError::NotFound`]: the entity vanished
//! - [`CollectionError::Conflict`]: concurrent modification, refetch then retry
//! - [`CollectionError::InvalidArgument`]: programmer error in a spec
//!
//! # Example
//!
//! ```rust,ignore
//! use clinic::prelude::*;
//!
//! match view.toggle_field(&id, "favorite").await {
//!     Ok(patient) => println!("favorite is now {:?}", patient.favorite),
//!     Err(CollectionError::Conflict { .. }) => view.refresh().await?,
//!     Err(e) => eprintln!("toggle failed: {}", e),
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// The main error type for collection views and gateways
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionError {
    /// Transport or connectivity failure (timeouts included)
    Network { message: String },

    /// Caller-supplied data was rejected
    Validation(ValidationError),

    /// The entity does not exist (or no longer exists)
    NotFound { entity_type: String, id: String },

    /// Concurrent modification, or a second mutation on an id that already
    /// has one in flight
    Conflict {
        entity_type: String,
        id: String,
        message: String,
    },

    /// A view/query spec was constructed with an illegal value
    InvalidArgument { argument: String, message: String },

    /// The session has no ready user
    Unauthenticated,

    /// Should not happen in normal operation
    Internal(String),
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionError::Network { message } => write!(f, "Network error: {}", message),
            CollectionError::Validation(e) => write!(f, "{}", e),
            CollectionError::NotFound { entity_type, id } => {
                write!(f, "{} with id '{}' not found", entity_type, id)
            }
            CollectionError::Conflict {
                entity_type,
                id,
                message,
            } => write!(f, "Conflict on {} '{}': {}", entity_type, id, message),
            CollectionError::InvalidArgument { argument, message } => {
                write!(f, "Invalid argument '{}': {}", argument, message)
            }
            CollectionError::Unauthenticated => write!(f, "No authenticated user"),
            CollectionError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for CollectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectionError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// Error body exchanged with remote backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CollectionError {
    pub fn network(message: impl Into<String>) -> Self {
        CollectionError::Network {
            message: message.into(),
        }
    }

    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        CollectionError::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn conflict(
        entity_type: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CollectionError::Conflict {
            entity_type: entity_type.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        CollectionError::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        CollectionError::Validation(ValidationError::FieldError {
            field: field.into(),
            message: message.into(),
        })
    }

    /// Whether retrying the same call (possibly after a refetch) can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CollectionError::Network { .. } | CollectionError::Conflict { .. }
        )
    }

    /// HTTP-style status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CollectionError::Network { .. } => 503,
            CollectionError::Validation(_) => 422,
            CollectionError::NotFound { .. } => 404,
            CollectionError::Conflict { .. } => 409,
            CollectionError::InvalidArgument { .. } => 400,
            CollectionError::Unauthenticated => 401,
            CollectionError::Internal(_) => 500,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            CollectionError::Network { .. } => "NETWORK_ERROR",
            CollectionError::Validation(e) => e.error_code(),
            CollectionError::NotFound { .. } => "ENTITY_NOT_FOUND",
            CollectionError::Conflict { .. } => "CONFLICT",
            CollectionError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            CollectionError::Unauthenticated => "UNAUTHENTICATED",
            CollectionError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            CollectionError::NotFound { entity_type, id } => Some(serde_json::json!({
                "entity_type": entity_type,
                "id": id,
            })),
            CollectionError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            CollectionError::Validation(ValidationError::FieldError { field, message }) => {
                Some(serde_json::json!({ "fields": [{ "field": field, "message": message }] }))
            }
            _ => None,
        }
    }

    /// Map a failed remote response onto the taxonomy
    ///
    /// `entity_type` and `id` fill in the context the remote body usually
    /// lacks.
    pub fn from_status(
        status: u16,
        body: Option<ErrorResponse>,
        entity_type: &str,
        id: Option<&str>,
    ) -> Self {
        let message = body
            .as_ref()
            .map(|b| b.message.clone())
            .unwrap_or_else(|| format!("remote returned status {}", status));
        let id = id.unwrap_or_default().to_string();

        match status {
            400 | 422 => {
                let fields = body
                    .as_ref()
                    .and_then(|b| b.details.as_ref())
                    .and_then(|d| d.get("fields"))
                    .and_then(|f| {
                        serde_json::from_value::<Vec<FieldValidationError>>(f.clone()).ok()
                    });
                match fields {
                    Some(fields) if !fields.is_empty() => {
                        CollectionError::Validation(ValidationError::FieldErrors(fields))
                    }
                    _ => CollectionError::Validation(ValidationError::Rejected { message }),
                }
            }
            401 | 403 => CollectionError::Unauthenticated,
            404 | 410 => CollectionError::not_found(entity_type, id),
            409 | 412 => CollectionError::conflict(entity_type, id, message),
            _ => CollectionError::network(message),
        }
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to input validation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Single field validation error
    FieldError { field: String, message: String },

    /// Multiple field validation errors
    FieldErrors(Vec<FieldValidationError>),

    /// A filter key the collection does not know
    UnsupportedFilter { key: String },

    /// Rejected without per-field detail
    Rejected { message: String },
}

/// A single field validation error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

impl FieldValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::FieldError { field, message } => {
                write!(f, "Validation error for field '{}': {}", field, message)
            }
            ValidationError::FieldErrors(errors) => {
                let msgs: Vec<String> = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect();
                write!(f, "Validation errors: {}", msgs.join(", "))
            }
            ValidationError::UnsupportedFilter { key } => {
                write!(f, "Unsupported filter key: {}", key)
            }
            ValidationError::Rejected { message } => write!(f, "Validation failed: {}", message),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::UnsupportedFilter { .. } => "UNSUPPORTED_FILTER",
            _ => "VALIDATION_ERROR",
        }
    }

    /// Names of the offending fields
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ValidationError::FieldError { field, .. } => vec![field.as_str()],
            ValidationError::FieldErrors(errors) => {
                errors.iter().map(|e| e.field.as_str()).collect()
            }
            ValidationError::UnsupportedFilter { key } => vec![key.as_str()],
            ValidationError::Rejected { .. } => Vec::new(),
        }
    }
}

impl From<ValidationError> for CollectionError {
    fn from(err: ValidationError) -> Self {
        CollectionError::Validation(err)
    }
}

impl From<serde_json::Error> for CollectionError {
    fn from(err: serde_json::Error) -> Self {
        CollectionError::Internal(format!("serialization failed: {}", err))
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for CollectionError {
    fn from(err: reqwest::Error) -> Self {
        CollectionError::network(err.to_string())
    }
}

/// A specialized Result type for collection operations
pub type CollectionResult<T> = Result<T, CollectionError>;
