//! rebac-server: configuration, storage adapters and the service facade
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               rebac-server                   │
//! ├─────────────────────────────────────────────┤
//! │  config.rs        - Layered configuration    │
//! │  observability.rs - Structured logging       │
//! │  adapters.rs      - DataStore -> resolver    │
//! │  service.rs       - Model/tuple writes,      │
//! │                     check and expand         │
//! │  fixture.rs       - YAML fixtures            │
//! └─────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod config;
pub mod fixture;
pub mod observability;
pub mod service;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServerConfig};
pub use fixture::{Fixture, FixtureError};
pub use observability::{init_logging, LoggingConfig};
pub use service::{AuthzService, ServiceError, ServiceResult};
