//! Request and response types for the graph resolver.

use serde::Serialize;

use crate::model::{Object, User};

/// Request for a permission check.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// The store ID to check against.
    pub store_id: String,
    /// The user identifier (e.g., "user:alice" or "group:eng#member").
    pub user: String,
    /// The relation to check (e.g., "viewer").
    pub relation: String,
    /// The object identifier (e.g., "document:readme").
    pub object: String,
    /// Tuples that exist for this request only.
    pub contextual_tuples: Vec<ContextualTuple>,
    /// Model to resolve against. The latest model of the store when `None`.
    pub authorization_model_id: Option<String>,
}

impl CheckRequest {
    pub fn new(
        store_id: impl Into<String>,
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
            contextual_tuples: Vec::new(),
            authorization_model_id: None,
        }
    }

    pub fn with_contextual_tuples(mut self, contextual_tuples: Vec<ContextualTuple>) -> Self {
        self.contextual_tuples = contextual_tuples;
        self
    }

    pub fn with_model_id(mut self, authorization_model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(authorization_model_id.into());
        self
    }
}

/// A contextual tuple for temporary authorization during a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextualTuple {
    pub user: String,
    pub relation: String,
    pub object: String,
}

impl ContextualTuple {
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

/// Counters collected while answering one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionMetadata {
    /// Deepest depth budget spent on any path.
    pub depth_reached: u32,
    /// Tuple reads issued to the store (contextual tuples are not counted).
    pub datastore_queries: u64,
}

/// Result of a permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub allowed: bool,
    pub metadata: ResolutionMetadata,
}

/// Reference to a stored tuple for resolver use.
///
/// Carries only the user side; the object and relation are the read key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTupleRef {
    pub user_type: String,
    pub user_id: String,
    pub user_relation: Option<String>,
}

impl StoredTupleRef {
    pub fn new(
        user_type: impl Into<String>,
        user_id: impl Into<String>,
        user_relation: Option<String>,
    ) -> Self {
        Self {
            user_type: user_type.into(),
            user_id: user_id.into(),
            user_relation,
        }
    }

    /// Converts to a typed user. A `*` id becomes a wildcard.
    pub fn to_user(&self) -> User {
        let object = Object::new(&self.user_type, &self.user_id);
        match &self.user_relation {
            Some(relation) => User::Userset {
                object,
                relation: relation.clone(),
            },
            None if object.is_wildcard() => User::Wildcard {
                user_type: object.object_type,
            },
            None => User::Object(object),
        }
    }
}

/// Request for expanding a relation tree.
#[derive(Debug, Clone)]
pub struct ExpandRequest {
    pub store_id: String,
    /// The relation to expand (e.g., "viewer").
    pub relation: String,
    /// The object to expand (e.g., "document:readme").
    pub object: String,
    pub contextual_tuples: Vec<ContextualTuple>,
    pub authorization_model_id: Option<String>,
}

impl ExpandRequest {
    pub fn new(
        store_id: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            relation: relation.into(),
            object: object.into(),
            contextual_tuples: Vec::new(),
            authorization_model_id: None,
        }
    }

    pub fn with_contextual_tuples(mut self, contextual_tuples: Vec<ContextualTuple>) -> Self {
        self.contextual_tuples = contextual_tuples;
        self
    }

    pub fn with_model_id(mut self, authorization_model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(authorization_model_id.into());
        self
    }
}

/// Result of expanding a relation tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandResult {
    pub tree: UsersetTree,
    pub metadata: ResolutionMetadata,
}

/// A tree structure representing the expansion of a relation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsersetTree {
    pub root: ExpandNode,
}

/// A node in the expansion tree.
///
/// Nodes mirror the rewrite that produced them. `name` is the
/// `type:id#relation` userset being described.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandNode {
    Leaf(ExpandLeaf),
    Union {
        name: String,
        nodes: Vec<ExpandNode>,
    },
    Intersection {
        name: String,
        nodes: Vec<ExpandNode>,
    },
    Difference {
        name: String,
        base: Box<ExpandNode>,
        subtract: Box<ExpandNode>,
    },
}

impl ExpandNode {
    /// Returns the name of this node.
    pub fn name(&self) -> &str {
        match self {
            ExpandNode::Leaf(leaf) => &leaf.name,
            ExpandNode::Union { name, .. }
            | ExpandNode::Intersection { name, .. }
            | ExpandNode::Difference { name, .. } => name,
        }
    }
}

/// A leaf node in the expansion tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandLeaf {
    pub name: String,
    pub value: ExpandLeafValue,
}

/// The value of a leaf node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandLeafValue {
    /// Users named by direct tuples. Userset references are listed, not expanded.
    Users(Vec<String>),
    /// A computed userset on the same object.
    Computed(ComputedExpansion),
    /// One computed userset per parent object reached through `tupleset`.
    TupleToUserset {
        tupleset: String,
        computed: Vec<ComputedExpansion>,
    },
}

/// A userset reference and, unless it closes a cycle, its own expansion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedExpansion {
    /// `type:id#relation`.
    pub userset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expansion: Option<Box<ExpandNode>>,
}
