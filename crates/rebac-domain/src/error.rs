//! Domain error types for authorization operations.

use thiserror::Error;

use crate::model::ParserError;
use crate::validation::ValidationError;

/// Domain-specific errors for authorization operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Error parsing an authorization model (DSL or JSON).
    #[error("model parse error: {message}")]
    ModelParseError { message: String },

    /// The authorization model is structurally invalid.
    ///
    /// Every problem found is kept in `errors`; the message names the first one.
    #[error("invalid authorization model: {}", first_validation_error(.errors))]
    ModelValidation { errors: Vec<ValidationError> },

    /// Resolution needed more recursion than the configured limit allows.
    ///
    /// This is never a "denied" answer: the engine could not decide within bounds.
    #[error("depth limit exceeded (max: {max_depth})")]
    DepthLimitExceeded { max_depth: u32 },

    /// Timeout during resolution.
    #[error("timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The caller cancelled the request.
    #[error("resolution cancelled")]
    Cancelled,

    /// Invalid user format.
    #[error("invalid user format: {value}")]
    InvalidUserFormat { value: String },

    /// Invalid object format.
    #[error("invalid object format: {value}")]
    InvalidObjectFormat { value: String },

    /// Invalid relation format.
    #[error("invalid relation format: {value}")]
    InvalidRelationFormat { value: String },

    /// A contextual tuple supplied with a request is malformed or over the limit.
    #[error("invalid contextual tuple: {message}")]
    InvalidContextualTuple { message: String },

    /// Type not found in authorization model.
    #[error("type not found: {type_name}")]
    TypeNotFound { type_name: String },

    /// Relation not found on type.
    #[error("relation '{relation}' not found on type '{type_name}'")]
    RelationNotFound { type_name: String, relation: String },

    /// Store not found.
    #[error("store not found: {store_id}")]
    StoreNotFound { store_id: String },

    /// Authorization model not found. `model_id` is `None` when the store has no model at all.
    #[error("authorization model not found in store {store_id}: {}", .model_id.as_deref().unwrap_or("latest"))]
    ModelNotFound {
        store_id: String,
        model_id: Option<String>,
    },

    /// Transient failure reading tuples or models. Not retried by the engine.
    #[error("store unavailable: {message}")]
    StoreUnavailable { message: String },
}

impl DomainError {
    /// Returns true for errors caused by an unknown store, model, type or relation.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::StoreNotFound { .. }
                | DomainError::ModelNotFound { .. }
                | DomainError::TypeNotFound { .. }
                | DomainError::RelationNotFound { .. }
        )
    }

    /// Returns true if a retry by the caller may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DomainError::StoreUnavailable { .. } | DomainError::Timeout { .. }
        )
    }
}

impl From<ParserError> for DomainError {
    fn from(err: ParserError) -> Self {
        DomainError::ModelParseError {
            message: err.to_string(),
        }
    }
}

fn first_validation_error(errors: &[ValidationError]) -> String {
    match errors {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
