//! Graph resolver for authorization checks and expansions.
//!
//! - `graph_resolver`: the public entry points, request validation, timeout
//! - `check` / `expand`: recursive evaluation of userset rewrites
//! - `evaluator`: tuple reads with contextual overlay and the set operators
//! - `context`: per-call state (depth budget, active path, model, cancellation)

mod check;
mod config;
mod context;
mod evaluator;
mod expand;
mod graph_resolver;
mod traits;
mod types;

#[cfg(test)]
mod tests;

pub use config::ResolverConfig;
pub use context::CancellationToken;
pub use graph_resolver::GraphResolver;
pub use traits::{ModelRepository, TupleReader};
pub use types::{
    CheckRequest, CheckResult, ComputedExpansion, ContextualTuple, ExpandLeaf, ExpandLeafValue,
    ExpandNode, ExpandRequest, ExpandResult, ResolutionMetadata, StoredTupleRef, UsersetTree,
};
