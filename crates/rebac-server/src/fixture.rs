//! YAML fixtures: a model plus tuples, loaded into a store in one step.
//!
//! ```yaml
//! store_id: demo
//! model: |
//!   type user
//!   type document
//!     relations
//!       define viewer as self
//! tuples:
//!   - document:1#viewer@user:alice
//! ```

use std::path::Path;

use rebac_domain::error::DomainError;
use rebac_domain::model::Tuple;
use rebac_storage::DataStore;
use serde::Deserialize;
use thiserror::Error;

use crate::service::{AuthzService, ServiceError};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid fixture: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid fixture tuple '{tuple}': {source}")]
    Tuple {
        tuple: String,
        #[source]
        source: DomainError,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    #[serde(default = "default_store_id")]
    pub store_id: String,
    /// Model in the DSL.
    pub model: String,
    /// Tuples in `object#relation@user` form.
    #[serde(default)]
    pub tuples: Vec<String>,
}

fn default_store_id() -> String {
    "default".to_string()
}

impl Fixture {
    pub fn from_yaml(yaml: &str) -> Result<Self, FixtureError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Writes the model, then the tuples in batches the store accepts.
    /// Returns the model id.
    pub async fn apply<S: DataStore + ?Sized>(
        &self,
        service: &AuthzService<S>,
        batch_size: usize,
    ) -> Result<String, FixtureError> {
        let tuples = self
            .tuples
            .iter()
            .map(|raw| {
                Tuple::parse(raw).map_err(|source| FixtureError::Tuple {
                    tuple: raw.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let model_id = service.write_model_dsl(&self.store_id, &self.model).await?;
        for batch in tuples.chunks(batch_size.max(1)) {
            service
                .write_tuples(&self.store_id, batch.to_vec(), vec![])
                .await?;
        }
        Ok(model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FIXTURE: &str = r#"
store_id: demo
model: |
  type user
  type document
    relations
      define viewer as self
tuples:
  - document:1#viewer@user:alice
  - document:2#viewer@user:bob
"#;

    #[test]
    fn test_fixture_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{FIXTURE}").unwrap();

        let fixture = Fixture::load(file.path()).unwrap();
        assert_eq!(fixture.store_id, "demo");
        assert_eq!(fixture.tuples.len(), 2);
    }

    #[test]
    fn test_fixture_defaults_and_errors() {
        let fixture = Fixture::from_yaml("model: type user").unwrap();
        assert_eq!(fixture.store_id, "default");
        assert!(fixture.tuples.is_empty());

        assert!(matches!(
            Fixture::from_yaml("tuples: []"),
            Err(FixtureError::Yaml(_))
        ));
        assert!(matches!(
            Fixture::load("/nonexistent/fixture.yaml"),
            Err(FixtureError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_fixture_apply_in_batches() {
        let service = AuthzService::from_config(&ServerConfig::default());
        let fixture = Fixture::from_yaml(FIXTURE).unwrap();

        let model_id = fixture.apply(&service, 1).await.unwrap();
        assert!(!model_id.is_empty());

        let stored = service
            .store()
            .read_tuples("demo", &Default::default())
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_fixture_rejects_bad_tuple_before_writing() {
        let service = AuthzService::from_config(&ServerConfig::default());
        let mut fixture = Fixture::from_yaml(FIXTURE).unwrap();
        fixture.tuples.push("not-a-tuple".to_string());

        assert!(matches!(
            fixture.apply(&service, 10).await,
            Err(FixtureError::Tuple { .. })
        ));
        assert!(service.store().get_store("demo").await.is_err());
    }
}
