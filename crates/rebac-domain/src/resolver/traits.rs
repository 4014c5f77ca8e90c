//! Traits for storage operations needed by the resolver.
//!
//! Implementations are expected to read from a consistent snapshot for the
//! lifetime of a single call; the resolver does not compensate for tuples
//! written while it is running.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::model::CompiledModel;

use super::types::StoredTupleRef;

/// Trait for tuple storage operations needed by the resolver.
#[async_trait]
pub trait TupleReader: Send + Sync {
    /// Reads the users of every tuple `object_type:object_id#relation@...`.
    ///
    /// Returns an empty list when nothing matches, including for unknown
    /// objects. Errors are reserved for storage failures.
    async fn read_tuples(
        &self,
        store_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> DomainResult<Vec<StoredTupleRef>>;

    /// Reads the tupleset tuples followed by a tuple-to-userset rewrite.
    ///
    /// Defaults to [`TupleReader::read_tuples`]. Backends that index tupleset
    /// relations separately can override it.
    async fn read_tupleset(
        &self,
        store_id: &str,
        object_type: &str,
        object_id: &str,
        tupleset: &str,
    ) -> DomainResult<Vec<StoredTupleRef>> {
        self.read_tuples(store_id, object_type, object_id, tupleset)
            .await
    }
}

/// Trait for authorization model lookups needed by the resolver.
///
/// Models are immutable once written, so implementations may cache freely.
#[async_trait]
pub trait ModelRepository: Send + Sync {
    /// Gets a specific model.
    async fn get_model(&self, store_id: &str, model_id: &str) -> DomainResult<Arc<CompiledModel>>;

    /// Gets the most recently written model of a store.
    async fn get_latest_model(&self, store_id: &str) -> DomainResult<Arc<CompiledModel>>;
}
