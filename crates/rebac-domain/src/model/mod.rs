//! Authorization model types, sources and compilation.
//!
//! This module contains:
//! - Core type definitions (Object, User, Tuple, Rewrite)
//! - Authorization model structures
//! - DSL parser and JSON loader
//! - `CompiledModel`, the validated form the resolver runs against

mod compiled;
mod json;
mod parser;
mod types;
#[cfg(test)]
mod types_proptest;

pub use compiled::CompiledModel;
pub use json::{from_json, to_json};
pub use parser::{parse, ParserError, ParserResult};
pub use types::*;
