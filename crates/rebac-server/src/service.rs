//! Authorization service facade.
//!
//! Ties a [`DataStore`] to the graph resolver: models are validated before
//! they are appended to a store's history, tuples are checked against the
//! store's latest model before they are written, and checks and expansions
//! run against storage through the adapters.

use std::sync::Arc;

use rebac_domain::error::{DomainError, DomainResult};
use rebac_domain::model::{from_json, parse, to_json, AuthorizationModel, CompiledModel, Tuple, User};
use rebac_domain::resolver::{
    CheckRequest, CheckResult, ExpandRequest, ExpandResult, GraphResolver, ModelRepository,
};
use rebac_domain::validation::ValidationLimits;
use rebac_storage::{
    DataStore, MemoryDataStore, StorageError, StoredAuthorizationModel, StoredTuple,
};
use thiserror::Error;
use tracing::{info, instrument};

use crate::adapters::{DataStoreModelRepository, DataStoreTupleReader};
use crate::config::ServerConfig;

/// Errors surfaced by the service facade.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

type Resolver<S> = GraphResolver<DataStoreTupleReader<S>, DataStoreModelRepository<S>>;

/// Model writes, tuple writes, check and expand over one [`DataStore`].
pub struct AuthzService<S: DataStore + ?Sized> {
    store: Arc<S>,
    models: Arc<DataStoreModelRepository<S>>,
    resolver: Resolver<S>,
    limits: ValidationLimits,
}

impl AuthzService<MemoryDataStore> {
    /// Builds a service over a fresh in-memory store configured by `config`.
    pub fn from_config(config: &ServerConfig) -> Self {
        let store = Arc::new(
            MemoryDataStore::new().with_max_tuples_per_write(config.storage.max_tuples_per_write),
        );
        Self::new(store, config)
    }
}

impl<S: DataStore + ?Sized> AuthzService<S> {
    pub fn new(store: Arc<S>, config: &ServerConfig) -> Self {
        let limits = config.validation_limits();
        let models = Arc::new(DataStoreModelRepository::new(Arc::clone(&store), limits));
        let resolver = GraphResolver::with_config(
            Arc::new(DataStoreTupleReader::new(Arc::clone(&store))),
            Arc::clone(&models),
            config.resolver_config(),
        );
        Self {
            store,
            models,
            resolver,
            limits,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Parses, validates and appends a DSL model. Returns the new model id.
    pub async fn write_model_dsl(&self, store_id: &str, dsl: &str) -> ServiceResult<String> {
        let model = parse(dsl).map_err(DomainError::from)?;
        self.write_model(store_id, model).await
    }

    /// Parses, validates and appends a JSON model. Returns the new model id.
    pub async fn write_model_json(&self, store_id: &str, json: &str) -> ServiceResult<String> {
        let model = from_json(json)?;
        self.write_model(store_id, model).await
    }

    /// Validates `model` and appends it to the store's history, creating
    /// the store on first use.
    #[instrument(skip(self, model), fields(types = model.type_definitions.len()))]
    pub async fn write_model(
        &self,
        store_id: &str,
        model: AuthorizationModel,
    ) -> ServiceResult<String> {
        let json = to_json(&model)?;
        CompiledModel::compile(model.clone(), self.limits)?;

        self.store.ensure_store(store_id).await?;
        let stored = self
            .store
            .write_authorization_model(StoredAuthorizationModel::new(
                store_id,
                model.schema_version,
                json,
            ))
            .await?;

        info!(model_id = %stored.id, "authorization model written");
        Ok(stored.id)
    }

    /// Writes and deletes tuples atomically.
    ///
    /// Written tuples must name a type and relation of the store's latest
    /// model. Deletes are not checked so stale tuples can still be removed.
    #[instrument(skip(self, writes, deletes), fields(writes = writes.len(), deletes = deletes.len()))]
    pub async fn write_tuples(
        &self,
        store_id: &str,
        writes: Vec<Tuple>,
        deletes: Vec<Tuple>,
    ) -> ServiceResult<()> {
        let model = self.models.get_latest_model(store_id).await?;
        for tuple in &writes {
            model.rewrite(&tuple.object.object_type, &tuple.relation)?;
        }

        self.store
            .write_tuples(
                store_id,
                writes.iter().map(to_stored).collect(),
                deletes.iter().map(to_stored).collect(),
            )
            .await?;
        Ok(())
    }

    pub async fn check(&self, request: &CheckRequest) -> DomainResult<CheckResult> {
        self.resolver.check(request).await
    }

    pub async fn expand(&self, request: &ExpandRequest) -> DomainResult<ExpandResult> {
        self.resolver.expand(request).await
    }
}

fn to_stored(tuple: &Tuple) -> StoredTuple {
    let (user_type, user_id, user_relation) = match &tuple.user {
        User::Object(object) => (object.object_type.as_str(), object.object_id.as_str(), None),
        User::Userset { object, relation } => (
            object.object_type.as_str(),
            object.object_id.as_str(),
            Some(relation.clone()),
        ),
        User::Wildcard { user_type } => (user_type.as_str(), "*", None),
    };
    StoredTuple::new(
        tuple.object.object_type.as_str(),
        tuple.object.object_id.as_str(),
        tuple.relation.as_str(),
        user_type,
        user_id,
        user_relation,
    )
}
