//! Adapters exposing a [`DataStore`] through the resolver's storage traits.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rebac_domain::error::{DomainError, DomainResult};
use rebac_domain::model::{from_json, CompiledModel};
use rebac_domain::resolver::{ModelRepository, StoredTupleRef, TupleReader};
use rebac_domain::validation::ValidationLimits;
use rebac_storage::{DataStore, StorageError, StoredAuthorizationModel, TupleFilter};
use tracing::debug;

/// Maps a storage failure onto the resolver's error vocabulary.
///
/// Missing stores and models keep their meaning; anything else is an
/// unavailable store from the resolver's point of view.
pub(crate) fn map_storage_error(store_id: &str, model_id: Option<&str>, err: StorageError) -> DomainError {
    match err {
        StorageError::StoreNotFound { store_id } => DomainError::StoreNotFound { store_id },
        StorageError::ModelNotFound { .. } => DomainError::ModelNotFound {
            store_id: store_id.to_string(),
            model_id: model_id.map(str::to_string),
        },
        other => DomainError::StoreUnavailable {
            message: other.to_string(),
        },
    }
}

/// Reads resolver tuples from a [`DataStore`].
pub struct DataStoreTupleReader<S: ?Sized> {
    store: Arc<S>,
}

impl<S: DataStore + ?Sized> DataStoreTupleReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: DataStore + ?Sized> TupleReader for DataStoreTupleReader<S> {
    async fn read_tuples(
        &self,
        store_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> DomainResult<Vec<StoredTupleRef>> {
        let filter = TupleFilter::for_object_relation(object_type, object_id, relation);
        let tuples = self
            .store
            .read_tuples(store_id, &filter)
            .await
            .map_err(|e| map_storage_error(store_id, None, e))?;

        Ok(tuples
            .into_iter()
            .map(|t| StoredTupleRef::new(t.user_type, t.user_id, t.user_relation))
            .collect())
    }
}

/// Loads and compiles models from a [`DataStore`].
///
/// Compiled models are cached by store and model id. Model versions are
/// immutable, so entries never go stale; the cache is dropped with the
/// repository.
pub struct DataStoreModelRepository<S: ?Sized> {
    store: Arc<S>,
    limits: ValidationLimits,
    compiled: DashMap<(String, String), Arc<CompiledModel>>,
}

impl<S: DataStore + ?Sized> DataStoreModelRepository<S> {
    pub fn new(store: Arc<S>, limits: ValidationLimits) -> Self {
        Self {
            store,
            limits,
            compiled: DashMap::new(),
        }
    }

    /// Number of compiled models held in the cache.
    pub fn cached_models(&self) -> usize {
        self.compiled.len()
    }

    fn compile(&self, stored: StoredAuthorizationModel) -> DomainResult<Arc<CompiledModel>> {
        let key = (stored.store_id.clone(), stored.id.clone());
        if let Some(model) = self.compiled.get(&key) {
            return Ok(Arc::clone(model.value()));
        }

        let model = from_json(&stored.model_json)?.with_id(stored.id.as_str());
        let compiled = Arc::new(CompiledModel::compile(model, self.limits)?);
        debug!(store_id = %stored.store_id, model_id = %stored.id, "compiled authorization model");

        Ok(Arc::clone(
            self.compiled.entry(key).or_insert(compiled).value(),
        ))
    }
}

#[async_trait]
impl<S: DataStore + ?Sized> ModelRepository for DataStoreModelRepository<S> {
    async fn get_model(&self, store_id: &str, model_id: &str) -> DomainResult<Arc<CompiledModel>> {
        if let Some(model) = self
            .compiled
            .get(&(store_id.to_string(), model_id.to_string()))
        {
            return Ok(Arc::clone(model.value()));
        }

        let stored = self
            .store
            .get_authorization_model(store_id, model_id)
            .await
            .map_err(|e| map_storage_error(store_id, Some(model_id), e))?;
        self.compile(stored)
    }

    async fn get_latest_model(&self, store_id: &str) -> DomainResult<Arc<CompiledModel>> {
        let stored = self
            .store
            .get_latest_authorization_model(store_id)
            .await
            .map_err(|e| map_storage_error(store_id, None, e))?;
        self.compile(stored)
    }
}
