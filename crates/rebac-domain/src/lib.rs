//! rebac-domain: Core authorization domain logic
//!
//! This crate contains the core authorization logic including:
//! - Authorization model types, DSL parser and JSON form
//! - Model validation
//! - Graph resolver for check and expand
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                rebac-domain                 │
//! ├─────────────────────────────────────────────┤
//! │  model/      - Types, DSL parser, JSON      │
//! │  validation/ - Model validation             │
//! │  resolver/   - Check and expand engine      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Storage is reached only through the [`resolver::TupleReader`] and
//! [`resolver::ModelRepository`] traits.

pub mod error;
pub mod model;
pub mod resolver;
pub mod validation;

// Re-export commonly used types at the crate root
pub use error::{DomainError, DomainResult};
pub use model::{AuthorizationModel, CompiledModel, Object, Rewrite, Tuple, User};
pub use resolver::{
    CancellationToken, CheckRequest, CheckResult, ExpandRequest, ExpandResult, GraphResolver,
    ResolverConfig,
};
