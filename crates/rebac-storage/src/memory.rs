//! In-memory storage implementation.
//!
//! Tuples of a store live in a `BTreeSet<StoredTuple>`. Because tuples sort
//! by object then relation, a read for one `object#relation` is a range scan
//! instead of a pass over the whole store.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    parse_user_filter, validate_store_id, validate_tuple, DataStore, Store,
    StoredAuthorizationModel, StoredTuple, TupleFilter, DEFAULT_MAX_TUPLES_PER_WRITE,
};

/// In-memory implementation of DataStore.
///
/// # Performance Characteristics
///
/// - **Write/delete tuple**: O(log N)
/// - **Read one `object#relation`**: O(log N + K) for K matches
/// - **Other reads**: O(N) filtered scan
/// - **Store operations**: O(1) (DashMap lookup)
///
/// A write batch holds its store's shard lock for validation and apply, so
/// it is atomic with respect to every other write and read of that store.
#[derive(Debug)]
pub struct MemoryDataStore {
    stores: DashMap<String, Store>,
    tuples: DashMap<String, BTreeSet<StoredTuple>>,
    /// Models per store in write order, newest at the end.
    authorization_models: DashMap<String, Vec<StoredAuthorizationModel>>,
    max_tuples_per_write: usize,
}

impl Default for MemoryDataStore {
    fn default() -> Self {
        Self {
            stores: DashMap::new(),
            tuples: DashMap::new(),
            authorization_models: DashMap::new(),
            max_tuples_per_write: DEFAULT_MAX_TUPLES_PER_WRITE,
        }
    }
}

impl MemoryDataStore {
    /// Creates a new in-memory data store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory data store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Sets the ceiling on writes plus deletes per `write_tuples` call.
    pub fn with_max_tuples_per_write(mut self, max: usize) -> Self {
        self.max_tuples_per_write = max;
        self
    }

    pub fn max_tuples_per_write(&self) -> usize {
        self.max_tuples_per_write
    }

    fn require_store(&self, store_id: &str) -> StorageResult<()> {
        if self.stores.contains_key(store_id) {
            Ok(())
        } else {
            Err(StorageError::StoreNotFound {
                store_id: store_id.to_string(),
            })
        }
    }
}

/// Rejects a batch that names the same tuple twice.
fn check_batch_unique(writes: &[StoredTuple], deletes: &[StoredTuple]) -> StorageResult<()> {
    let mut seen = HashSet::with_capacity(writes.len() + deletes.len());
    for tuple in writes.iter().chain(deletes) {
        if !seen.insert(tuple) {
            return Err(StorageError::InvalidInput {
                message: format!("tuple {tuple} appears more than once in the write"),
            });
        }
    }
    Ok(())
}

fn matches_filter(
    tuple: &StoredTuple,
    filter: &TupleFilter,
    user: Option<&(String, String, Option<String>)>,
) -> bool {
    filter
        .object_type
        .as_ref()
        .map_or(true, |ot| &tuple.object_type == ot)
        && filter
            .object_id
            .as_ref()
            .map_or(true, |oi| &tuple.object_id == oi)
        && filter.relation.as_ref().map_or(true, |r| &tuple.relation == r)
        && user.map_or(true, |(ut, ui, ur)| {
            &tuple.user_type == ut && &tuple.user_id == ui && &tuple.user_relation == ur
        })
}

#[async_trait]
impl DataStore for MemoryDataStore {
    #[instrument(skip(self), fields(store_id = %id))]
    async fn create_store(&self, id: &str, name: &str) -> StorageResult<Store> {
        validate_store_id(id)?;
        if name.trim().is_empty() {
            return Err(StorageError::InvalidInput {
                message: "store name cannot be empty".to_string(),
            });
        }

        let now = chrono::Utc::now();
        let store = Store {
            id: id.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };

        // Entry API keeps the existence check and insert atomic.
        match self.stores.entry(id.to_string()) {
            Entry::Occupied(_) => {
                return Err(StorageError::StoreAlreadyExists {
                    store_id: id.to_string(),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(store.clone());
            }
        }

        self.tuples.entry(id.to_string()).or_default();
        self.authorization_models.entry(id.to_string()).or_default();
        debug!("store created");

        Ok(store)
    }

    async fn get_store(&self, id: &str) -> StorageResult<Store> {
        self.stores
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| StorageError::StoreNotFound {
                store_id: id.to_string(),
            })
    }

    #[instrument(skip(self), fields(store_id = %id))]
    async fn delete_store(&self, id: &str) -> StorageResult<()> {
        if self.stores.remove(id).is_none() {
            return Err(StorageError::StoreNotFound {
                store_id: id.to_string(),
            });
        }
        self.tuples.remove(id);
        self.authorization_models.remove(id);
        Ok(())
    }

    async fn list_stores(&self) -> StorageResult<Vec<Store>> {
        let mut stores: Vec<Store> = self.stores.iter().map(|s| s.value().clone()).collect();
        stores.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(stores)
    }

    #[instrument(skip(self, writes, deletes), fields(writes = writes.len(), deletes = deletes.len()))]
    async fn write_tuples(
        &self,
        store_id: &str,
        writes: Vec<StoredTuple>,
        deletes: Vec<StoredTuple>,
    ) -> StorageResult<()> {
        validate_store_id(store_id)?;
        let count = writes.len() + deletes.len();
        if count > self.max_tuples_per_write {
            return Err(StorageError::TooManyTuples {
                count,
                max: self.max_tuples_per_write,
            });
        }
        for tuple in writes.iter().chain(&deletes) {
            validate_tuple(tuple)?;
        }
        check_batch_unique(&writes, &deletes)?;
        self.require_store(store_id)?;

        let mut tuples = self
            .tuples
            .get_mut(store_id)
            .ok_or_else(|| StorageError::StoreNotFound {
                store_id: store_id.to_string(),
            })?;

        // Validate the whole batch before touching the set.
        if let Some(missing) = deletes.iter().find(|t| !tuples.contains(*t)) {
            return Err(StorageError::TupleNotFound {
                tuple: missing.to_string(),
            });
        }
        if let Some(existing) = writes.iter().find(|t| tuples.contains(*t)) {
            return Err(StorageError::DuplicateTuple {
                tuple: existing.to_string(),
            });
        }

        for tuple in &deletes {
            tuples.remove(tuple);
        }
        tuples.extend(writes);

        Ok(())
    }

    async fn read_tuples(
        &self,
        store_id: &str,
        filter: &TupleFilter,
    ) -> StorageResult<Vec<StoredTuple>> {
        let user_filter = filter.user.as_deref().map(parse_user_filter).transpose()?;

        let tuples = self
            .tuples
            .get(store_id)
            .ok_or_else(|| StorageError::StoreNotFound {
                store_id: store_id.to_string(),
            })?;

        let filtered = match (&filter.object_type, &filter.object_id, &filter.relation) {
            (Some(object_type), Some(object_id), Some(relation)) => {
                let start = StoredTuple::new(
                    object_type.as_str(),
                    object_id.as_str(),
                    relation.as_str(),
                    "",
                    "",
                    None,
                );
                tuples
                    .range(start..)
                    .take_while(|t| {
                        &t.object_type == object_type
                            && &t.object_id == object_id
                            && &t.relation == relation
                    })
                    .filter(|t| matches_filter(t, filter, user_filter.as_ref()))
                    .cloned()
                    .collect()
            }
            _ => tuples
                .iter()
                .filter(|t| matches_filter(t, filter, user_filter.as_ref()))
                .cloned()
                .collect(),
        };

        Ok(filtered)
    }

    // Authorization model operations

    #[instrument(skip(self, model), fields(store_id = %model.store_id, model_id = %model.id))]
    async fn write_authorization_model(
        &self,
        model: StoredAuthorizationModel,
    ) -> StorageResult<StoredAuthorizationModel> {
        validate_store_id(&model.store_id)?;
        self.require_store(&model.store_id)?;

        self.authorization_models
            .entry(model.store_id.clone())
            .or_default()
            .push(model.clone());
        debug!("authorization model written");

        Ok(model)
    }

    async fn get_authorization_model(
        &self,
        store_id: &str,
        model_id: &str,
    ) -> StorageResult<StoredAuthorizationModel> {
        self.require_store(store_id)?;

        self.authorization_models
            .get(store_id)
            .and_then(|models| models.iter().find(|m| m.id == model_id).cloned())
            .ok_or_else(|| StorageError::ModelNotFound {
                model_id: model_id.to_string(),
            })
    }

    async fn get_latest_authorization_model(
        &self,
        store_id: &str,
    ) -> StorageResult<StoredAuthorizationModel> {
        self.require_store(store_id)?;

        self.authorization_models
            .get(store_id)
            .and_then(|models| models.last().cloned())
            .ok_or_else(|| StorageError::ModelNotFound {
                model_id: format!("latest (no models exist for store {store_id})"),
            })
    }

    async fn list_authorization_models(
        &self,
        store_id: &str,
    ) -> StorageResult<Vec<StoredAuthorizationModel>> {
        self.require_store(store_id)?;

        Ok(self
            .authorization_models
            .get(store_id)
            .map(|models| models.iter().rev().cloned().collect())
            .unwrap_or_default())
    }
}
