//! Configuration for the graph resolver.

use std::time::Duration;

/// Configuration for the graph resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum resolution depth. Each descent through a rewrite edge spends one unit.
    pub max_depth: u32,
    /// Timeout for a single check or expand call.
    pub timeout: Duration,
    /// Maximum number of sibling sub-problems evaluated at once at any node.
    pub max_concurrency: usize,
    /// Maximum number of contextual tuples accepted per request.
    pub max_contextual_tuples: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 25,
            timeout: Duration::from_secs(30),
            max_concurrency: 50,
            max_contextual_tuples: 100,
        }
    }
}

impl ResolverConfig {
    /// Creates a new configuration with the specified max depth.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Creates a new configuration with the specified timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Creates a new configuration with the specified fan-out width.
    ///
    /// A width of zero is treated as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_max_contextual_tuples(mut self, max_contextual_tuples: usize) -> Self {
        self.max_contextual_tuples = max_contextual_tuples;
        self
    }
}
