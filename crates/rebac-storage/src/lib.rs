//! rebac-storage: Storage abstraction layer
//!
//! This crate provides the storage abstraction for the engine, including:
//! - DataStore trait for stores, tuples and model history
//! - In-memory implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               rebac-storage                 │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - DataStore trait definition   │
//! │  memory.rs   - In-memory implementation     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::MemoryDataStore;
pub use traits::{
    DataStore, Store, StoredAuthorizationModel, StoredTuple, TupleFilter,
    DEFAULT_MAX_TUPLES_PER_WRITE,
};
