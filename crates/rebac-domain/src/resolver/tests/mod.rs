//! Tests for the graph resolver module.
//!
//! Organized by functionality:
//! - Check: direct tuples, computed relations, set operators, contextual
//!   tuples, safety limits and request validation
//! - Expand: tree shapes for every rewrite and cycle handling
//! - Properties: set semantics checked against random tuple data

mod mocks;

#[cfg(test)]
mod check_tests;
