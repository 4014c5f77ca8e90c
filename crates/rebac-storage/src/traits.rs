//! DataStore trait definition.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{StorageError, StorageResult};

/// Default ceiling on writes plus deletes in one `write_tuples` call.
pub const DEFAULT_MAX_TUPLES_PER_WRITE: usize = 100;

const MAX_STORE_ID_LENGTH: usize = 128;

/// Filter for reading tuples.
#[derive(Debug, Clone, Default)]
pub struct TupleFilter {
    /// Filter by object type.
    pub object_type: Option<String>,
    /// Filter by object ID.
    pub object_id: Option<String>,
    /// Filter by relation.
    pub relation: Option<String>,
    /// Filter by user, as `type:id` or `type:id#relation`.
    pub user: Option<String>,
}

impl TupleFilter {
    /// Filter for every tuple of `object_type:object_id#relation`.
    pub fn for_object_relation(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            object_type: Some(object_type.into()),
            object_id: Some(object_id.into()),
            relation: Some(relation.into()),
            user: None,
        }
    }
}

/// A stored tuple.
///
/// Field order defines the sort order, so tuples of one
/// `object#relation` are contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoredTuple {
    pub object_type: String,
    pub object_id: String,
    pub relation: String,
    pub user_type: String,
    pub user_id: String,
    pub user_relation: Option<String>,
}

impl StoredTuple {
    pub fn new(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        relation: impl Into<String>,
        user_type: impl Into<String>,
        user_id: impl Into<String>,
        user_relation: Option<String>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
            relation: relation.into(),
            user_type: user_type.into(),
            user_id: user_id.into(),
            user_relation,
        }
    }

    /// The user in `type:id` or `type:id#relation` form.
    pub fn user(&self) -> String {
        match &self.user_relation {
            Some(relation) => format!("{}:{}#{}", self.user_type, self.user_id, relation),
            None => format!("{}:{}", self.user_type, self.user_id),
        }
    }
}

impl fmt::Display for StoredTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}#{}@{}",
            self.object_type,
            self.object_id,
            self.relation,
            self.user()
        )
    }
}

/// Store metadata.
#[derive(Debug, Clone)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted authorization model version.
///
/// Models are immutable once written; a store's history is append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAuthorizationModel {
    pub id: String,
    pub store_id: String,
    pub schema_version: String,
    /// The model in its JSON form.
    pub model_json: String,
    pub created_at: DateTime<Utc>,
}

impl StoredAuthorizationModel {
    /// Creates a model version with a fresh ULID id.
    pub fn new(
        store_id: impl Into<String>,
        schema_version: impl Into<String>,
        model_json: impl Into<String>,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            store_id: store_id.into(),
            schema_version: schema_version.into(),
            model_json: model_json.into(),
            created_at: Utc::now(),
        }
    }
}

/// Abstract storage interface for authorization data.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    // Store operations

    /// Creates a new store.
    async fn create_store(&self, id: &str, name: &str) -> StorageResult<Store>;

    /// Gets a store by ID.
    async fn get_store(&self, id: &str) -> StorageResult<Store>;

    /// Deletes a store with its tuples and models.
    async fn delete_store(&self, id: &str) -> StorageResult<()>;

    /// Lists all stores, oldest first.
    async fn list_stores(&self) -> StorageResult<Vec<Store>>;

    /// Returns the store, creating it (named after its id) if it does not exist.
    async fn ensure_store(&self, id: &str) -> StorageResult<Store> {
        match self.get_store(id).await {
            Err(StorageError::StoreNotFound { .. }) => match self.create_store(id, id).await {
                Err(StorageError::StoreAlreadyExists { .. }) => self.get_store(id).await,
                other => other,
            },
            other => other,
        }
    }

    // Tuple operations

    /// Writes and deletes tuples atomically.
    ///
    /// Fails without applying anything if a written tuple already exists,
    /// a deleted tuple does not, or the batch exceeds the per-write limit.
    async fn write_tuples(
        &self,
        store_id: &str,
        writes: Vec<StoredTuple>,
        deletes: Vec<StoredTuple>,
    ) -> StorageResult<()>;

    /// Writes a single tuple.
    async fn write_tuple(&self, store_id: &str, tuple: StoredTuple) -> StorageResult<()> {
        self.write_tuples(store_id, vec![tuple], vec![]).await
    }

    /// Deletes a single tuple.
    async fn delete_tuple(&self, store_id: &str, tuple: StoredTuple) -> StorageResult<()> {
        self.write_tuples(store_id, vec![], vec![tuple]).await
    }

    /// Reads tuples matching the filter.
    async fn read_tuples(
        &self,
        store_id: &str,
        filter: &TupleFilter,
    ) -> StorageResult<Vec<StoredTuple>>;

    // Authorization model operations

    /// Appends a model version to its store.
    async fn write_authorization_model(
        &self,
        model: StoredAuthorizationModel,
    ) -> StorageResult<StoredAuthorizationModel>;

    /// Gets a model version by ID.
    async fn get_authorization_model(
        &self,
        store_id: &str,
        model_id: &str,
    ) -> StorageResult<StoredAuthorizationModel>;

    /// Gets the most recently written model version.
    async fn get_latest_authorization_model(
        &self,
        store_id: &str,
    ) -> StorageResult<StoredAuthorizationModel>;

    /// Lists model versions, newest first.
    async fn list_authorization_models(
        &self,
        store_id: &str,
    ) -> StorageResult<Vec<StoredAuthorizationModel>>;
}

/// Validates a store ID: non-empty, bounded, no whitespace.
pub fn validate_store_id(id: &str) -> StorageResult<()> {
    if id.is_empty() {
        return Err(StorageError::InvalidInput {
            message: "store id cannot be empty".to_string(),
        });
    }
    if id.len() > MAX_STORE_ID_LENGTH {
        return Err(StorageError::InvalidInput {
            message: format!("store id exceeds {MAX_STORE_ID_LENGTH} characters"),
        });
    }
    if id.chars().any(char::is_whitespace) {
        return Err(StorageError::InvalidInput {
            message: format!("store id '{id}' contains whitespace"),
        });
    }
    Ok(())
}

/// Validates that every tuple field is present.
pub fn validate_tuple(tuple: &StoredTuple) -> StorageResult<()> {
    let fields = [
        ("object_type", tuple.object_type.as_str()),
        ("object_id", tuple.object_id.as_str()),
        ("relation", tuple.relation.as_str()),
        ("user_type", tuple.user_type.as_str()),
        ("user_id", tuple.user_id.as_str()),
    ];
    if let Some((field, _)) = fields.iter().find(|(_, value)| value.is_empty()) {
        return Err(StorageError::InvalidInput {
            message: format!("tuple {field} cannot be empty"),
        });
    }
    if tuple.user_relation.as_deref() == Some("") {
        return Err(StorageError::InvalidInput {
            message: "tuple user_relation cannot be empty".to_string(),
        });
    }
    Ok(())
}

/// Parses a user filter into `(user_type, user_id, user_relation)`.
pub fn parse_user_filter(user: &str) -> StorageResult<(String, String, Option<String>)> {
    let invalid = || StorageError::InvalidFilter {
        message: format!("user filter '{user}' must be 'type:id' or 'type:id#relation'"),
    };

    let (user_type, rest) = user.split_once(':').ok_or_else(invalid)?;
    let (user_id, user_relation) = match rest.split_once('#') {
        Some((id, relation)) if !relation.is_empty() => (id, Some(relation.to_string())),
        Some(_) => return Err(invalid()),
        None => (rest, None),
    };
    if user_type.is_empty() || user_id.is_empty() {
        return Err(invalid());
    }
    Ok((user_type.to_string(), user_id.to_string(), user_relation))
}
