//! Per-call resolution state threaded through every recursive step.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{DomainError, DomainResult};
use crate::model::{CompiledModel, Object, Tuple, User};

use super::types::ResolutionMetadata;

/// Cooperative cancellation signal shared between a caller and a running resolution.
///
/// Cloning yields a handle to the same signal. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                // Every sender is gone, so cancellation can no longer happen.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Request-scoped tuples layered over the store for one call.
#[derive(Debug, Default)]
pub(crate) struct ContextualTuples {
    by_object: HashMap<Object, HashMap<String, Vec<User>>>,
}

impl ContextualTuples {
    pub(crate) fn new(tuples: Vec<Tuple>) -> Self {
        let mut by_object: HashMap<Object, HashMap<String, Vec<User>>> = HashMap::new();
        for tuple in tuples {
            let users = by_object
                .entry(tuple.object)
                .or_default()
                .entry(tuple.relation)
                .or_default();
            if !users.contains(&tuple.user) {
                users.push(tuple.user);
            }
        }
        Self { by_object }
    }

    pub(crate) fn users(&self, object: &Object, relation: &str) -> &[User] {
        self.by_object
            .get(object)
            .and_then(|relations| relations.get(relation))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct ResolutionStats {
    depth_reached: AtomicU32,
    datastore_queries: AtomicU64,
}

/// Immutable context for one step of a resolution.
///
/// Each descent produces a new value; siblings never observe each other's
/// depth or visited path. Counters and the cancellation signal are shared
/// by the whole call.
#[derive(Debug, Clone)]
pub(crate) struct ResolutionContext {
    store_id: Arc<str>,
    model: Arc<CompiledModel>,
    max_depth: u32,
    remaining_depth: u32,
    /// Nodes on the active path from the root, for cycle detection.
    visited: Arc<HashSet<String>>,
    contextual_tuples: Arc<ContextualTuples>,
    cancellation: CancellationToken,
    stats: Arc<ResolutionStats>,
}

impl ResolutionContext {
    pub(crate) fn new(
        store_id: &str,
        model: Arc<CompiledModel>,
        max_depth: u32,
        contextual_tuples: ContextualTuples,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            store_id: Arc::from(store_id),
            model,
            max_depth,
            remaining_depth: max_depth,
            visited: Arc::new(HashSet::new()),
            contextual_tuples: Arc::new(contextual_tuples),
            cancellation,
            stats: Arc::new(ResolutionStats::default()),
        }
    }

    pub(crate) fn store_id(&self) -> &str {
        &self.store_id
    }

    pub(crate) fn model(&self) -> &Arc<CompiledModel> {
        &self.model
    }

    pub(crate) fn contextual_tuples(&self) -> &ContextualTuples {
        &self.contextual_tuples
    }

    /// Spends one unit of depth budget.
    ///
    /// # Errors
    ///
    /// `DepthLimitExceeded` when the budget is already exhausted.
    pub(crate) fn descend(&self) -> DomainResult<Self> {
        if self.remaining_depth == 0 {
            return Err(DomainError::DepthLimitExceeded {
                max_depth: self.max_depth,
            });
        }
        let remaining_depth = self.remaining_depth - 1;
        self.stats
            .depth_reached
            .fetch_max(self.max_depth - remaining_depth, Ordering::Relaxed);
        Ok(Self {
            remaining_depth,
            ..self.clone()
        })
    }

    /// Whether `key` is already on the active path.
    pub(crate) fn on_path(&self, key: &str) -> bool {
        self.visited.contains(key)
    }

    /// Adds `key` to the active path, or returns `None` if it is already on it.
    pub(crate) fn enter(&self, key: String) -> Option<Self> {
        if self.visited.contains(&key) {
            return None;
        }
        // Copy-on-write: clone the set only when adding new entries
        let mut visited = (*self.visited).clone();
        visited.insert(key);
        Some(Self {
            visited: Arc::new(visited),
            ..self.clone()
        })
    }

    /// Fails with `Cancelled` once the caller has cancelled the call.
    pub(crate) fn ensure_active(&self) -> DomainResult<()> {
        if self.cancellation.is_cancelled() {
            Err(DomainError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(crate) fn record_query(&self) {
        self.stats.datastore_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn metadata(&self) -> ResolutionMetadata {
        ResolutionMetadata {
            depth_reached: self.stats.depth_reached.load(Ordering::Relaxed),
            datastore_queries: self.stats.datastore_queries.load(Ordering::Relaxed),
        }
    }
}
