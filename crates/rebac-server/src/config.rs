//! Configuration management for the authorization service.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use rebac_server::config::ServerConfig;
//!
//! // Load from file with env overrides
//! let config = ServerConfig::load("config.yaml")?;
//!
//! // Or load from environment only
//! let config = ServerConfig::from_env()?;
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use rebac_domain::resolver::ResolverConfig;
use rebac_domain::validation::ValidationLimits;
use serde::{Deserialize, Serialize};

use crate::observability::LoggingConfig;

const ENV_PREFIX: &str = "REBAC";

/// Service configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Resolver limits
    #[serde(default)]
    pub resolver: ResolverSettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Name reported in logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingConfig::default(),
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "rebac".to_string()
}

/// Resolver limits.
///
/// Environment overrides use the `REBAC_RESOLVER__` prefix, e.g.
/// `REBAC_RESOLVER__RESOLVE_NODE_LIMIT=10`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ResolverSettings {
    /// Maximum resolution depth
    #[serde(default = "default_resolve_node_limit")]
    pub resolve_node_limit: u32,

    /// Sibling sub-problems evaluated at once at any node
    #[serde(default = "default_max_concurrent_reads")]
    pub max_concurrent_reads: usize,

    /// Timeout per check or expand, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Contextual tuples accepted per request
    #[serde(default = "default_max_contextual_tuples")]
    pub max_contextual_tuples: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            resolve_node_limit: default_resolve_node_limit(),
            max_concurrent_reads: default_max_concurrent_reads(),
            request_timeout_ms: default_request_timeout_ms(),
            max_contextual_tuples: default_max_contextual_tuples(),
        }
    }
}

fn default_resolve_node_limit() -> u32 {
    25
}

fn default_max_concurrent_reads() -> usize {
    50
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_contextual_tuples() -> usize {
    100
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageSettings {
    /// Storage backend type. Only "memory" is available.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Writes plus deletes accepted in one tuple write
    #[serde(default = "default_max_tuples_per_write")]
    pub max_tuples_per_write: usize,

    /// Type definitions accepted in one model
    #[serde(default = "default_max_types")]
    pub max_types_per_authorization_model: usize,

    /// Relations accepted in one model, summed over all types
    #[serde(default = "default_max_relations")]
    pub max_relations_per_authorization_model: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            max_tuples_per_write: default_max_tuples_per_write(),
            max_types_per_authorization_model: default_max_types(),
            max_relations_per_authorization_model: default_max_relations(),
        }
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_max_tuples_per_write() -> usize {
    100
}

fn default_max_types() -> usize {
    100
}

fn default_max_relations() -> usize {
    1000
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

fn environment() -> Environment {
    // REBAC_RESOLVER__RESOLVE_NODE_LIMIT -> resolver.resolve_node_limit
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `REBAC_` and use `__` as separator.
    /// For example:
    /// - `REBAC_RESOLVER__REQUEST_TIMEOUT_MS=500` overrides `resolver.request_timeout_ms`
    /// - `REBAC_LOGGING__JSON=true` overrides `logging.json`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(environment())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(environment())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let limits = [
            ("resolver.resolve_node_limit", self.resolver.resolve_node_limit as usize),
            ("resolver.max_concurrent_reads", self.resolver.max_concurrent_reads),
            ("resolver.request_timeout_ms", self.resolver.request_timeout_ms as usize),
            ("storage.max_tuples_per_write", self.storage.max_tuples_per_write),
            (
                "storage.max_types_per_authorization_model",
                self.storage.max_types_per_authorization_model,
            ),
            (
                "storage.max_relations_per_authorization_model",
                self.storage.max_relations_per_authorization_model,
            ),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigLoadError::Invalid {
                message: format!("{name} must be greater than 0"),
            });
        }

        let valid_backends = ["memory"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "storage.backend must be one of: {:?}, got: {}",
                    valid_backends, self.storage.backend
                ),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        if self.service_name.trim().is_empty() {
            return Err(ConfigLoadError::Invalid {
                message: "service_name cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Resolver configuration derived from the `resolver` section.
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default()
            .with_max_depth(self.resolver.resolve_node_limit)
            .with_max_concurrency(self.resolver.max_concurrent_reads)
            .with_timeout(Duration::from_millis(self.resolver.request_timeout_ms))
            .with_max_contextual_tuples(self.resolver.max_contextual_tuples)
    }

    /// Model validation limits derived from the `storage` section.
    pub fn validation_limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_types: self.storage.max_types_per_authorization_model,
            max_relations: self.storage.max_relations_per_authorization_model,
        }
    }
}
