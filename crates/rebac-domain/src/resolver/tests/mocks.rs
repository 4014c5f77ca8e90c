//! Mock implementations for resolver testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{DomainError, DomainResult};
use crate::model::{parse, CompiledModel, Tuple, User};
use crate::resolver::{
    GraphResolver, ModelRepository, ResolverConfig, StoredTupleRef, TupleReader,
};
use crate::validation::ValidationLimits;

pub const STORE: &str = "store1";

/// Mock tuple reader for testing.
pub struct MockTupleReader {
    tuples: RwLock<HashMap<String, Vec<StoredTupleRef>>>,
    failing: RwLock<HashSet<String>>,
    delay: Option<Duration>,
    reads: AtomicU64,
}

fn key(store_id: &str, object_type: &str, object_id: &str, relation: &str) -> String {
    format!("{store_id}|{object_type}:{object_id}#{relation}")
}

impl MockTupleReader {
    pub fn new() -> Self {
        Self {
            tuples: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            delay: None,
            reads: AtomicU64::new(0),
        }
    }

    /// Every read sleeps for `delay` first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Adds a tuple in `object#relation@user` form to `STORE`.
    pub async fn add(&self, tuple: &str) {
        let tuple = Tuple::parse(tuple).unwrap();
        let (user_type, user_id, user_relation) = match &tuple.user {
            User::Object(o) => (o.object_type.clone(), o.object_id.clone(), None),
            User::Userset { object, relation } => (
                object.object_type.clone(),
                object.object_id.clone(),
                Some(relation.clone()),
            ),
            User::Wildcard { user_type } => (user_type.clone(), "*".to_string(), None),
        };
        self.tuples
            .write()
            .await
            .entry(key(
                STORE,
                &tuple.object.object_type,
                &tuple.object.object_id,
                &tuple.relation,
            ))
            .or_default()
            .push(StoredTupleRef::new(user_type, user_id, user_relation));
    }

    pub async fn add_all(&self, tuples: &[&str]) {
        for tuple in tuples {
            self.add(tuple).await;
        }
    }

    /// Reads of `object#relation` fail with `StoreUnavailable`.
    pub async fn fail_reads_of(&self, object: &str, relation: &str) {
        self.failing
            .write()
            .await
            .insert(format!("{STORE}|{object}#{relation}"));
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TupleReader for MockTupleReader {
    async fn read_tuples(
        &self,
        store_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> DomainResult<Vec<StoredTupleRef>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let key = key(store_id, object_type, object_id, relation);
        if self.failing.read().await.contains(&key) {
            return Err(DomainError::StoreUnavailable {
                message: format!("injected failure for {key}"),
            });
        }
        Ok(self
            .tuples
            .read()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }
}

/// Mock model repository for testing.
pub struct MockModelRepository {
    models: RwLock<HashMap<String, Vec<Arc<CompiledModel>>>>,
}

impl MockModelRepository {
    pub fn new() -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Compiles `dsl` and appends it to `STORE` under `id`.
    pub async fn add_model(&self, id: &str, dsl: &str) {
        let model = parse(dsl).unwrap().with_id(id);
        let compiled = CompiledModel::compile(model, ValidationLimits::default()).unwrap();
        self.models
            .write()
            .await
            .entry(STORE.to_string())
            .or_default()
            .push(Arc::new(compiled));
    }
}

#[async_trait]
impl ModelRepository for MockModelRepository {
    async fn get_model(&self, store_id: &str, model_id: &str) -> DomainResult<Arc<CompiledModel>> {
        let models = self.models.read().await;
        let store = models.get(store_id).ok_or_else(|| DomainError::StoreNotFound {
            store_id: store_id.to_string(),
        })?;
        store
            .iter()
            .find(|m| m.id() == Some(model_id))
            .cloned()
            .ok_or_else(|| DomainError::ModelNotFound {
                store_id: store_id.to_string(),
                model_id: Some(model_id.to_string()),
            })
    }

    async fn get_latest_model(&self, store_id: &str) -> DomainResult<Arc<CompiledModel>> {
        let models = self.models.read().await;
        let store = models.get(store_id).ok_or_else(|| DomainError::StoreNotFound {
            store_id: store_id.to_string(),
        })?;
        store.last().cloned().ok_or_else(|| DomainError::ModelNotFound {
            store_id: store_id.to_string(),
            model_id: None,
        })
    }
}

pub type MockResolver = GraphResolver<MockTupleReader, MockModelRepository>;

/// Builds a resolver over `dsl` and `tuples` in `STORE`.
pub async fn create_resolver(dsl: &str, tuples: &[&str]) -> (MockResolver, Arc<MockTupleReader>) {
    create_resolver_with(dsl, tuples, MockTupleReader::new(), ResolverConfig::default()).await
}

pub async fn create_resolver_with(
    dsl: &str,
    tuples: &[&str],
    reader: MockTupleReader,
    config: ResolverConfig,
) -> (MockResolver, Arc<MockTupleReader>) {
    let reader = Arc::new(reader);
    reader.add_all(tuples).await;
    let models = Arc::new(MockModelRepository::new());
    models.add_model("model1", dsl).await;
    (
        GraphResolver::with_config(Arc::clone(&reader), models, config),
        reader,
    )
}
