//! Storage error types.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Store not found.
    #[error("store not found: {store_id}")]
    StoreNotFound { store_id: String },

    /// Store already exists.
    #[error("store already exists: {store_id}")]
    StoreAlreadyExists { store_id: String },

    /// Model not found.
    #[error("model not found: {model_id}")]
    ModelNotFound { model_id: String },

    /// Tuple not found.
    #[error("tuple not found: {tuple}")]
    TupleNotFound { tuple: String },

    /// Duplicate tuple.
    #[error("duplicate tuple: {tuple}")]
    DuplicateTuple { tuple: String },

    /// Write request exceeds the per-write tuple limit.
    #[error("write contains {count} tuples, exceeding the limit of {max}")]
    TooManyTuples { count: usize, max: usize },

    /// Invalid filter error.
    #[error("invalid filter: {message}")]
    InvalidFilter { message: String },

    /// Invalid input error.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl StorageError {
    /// Returns true if the error names a missing store, model or tuple.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::StoreNotFound { .. }
                | StorageError::ModelNotFound { .. }
                | StorageError::TupleNotFound { .. }
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
