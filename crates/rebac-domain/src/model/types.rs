//! Core type definitions for the authorization model.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Character that separates an object's type from its id.
pub const TYPE_SEPARATOR: char = ':';
/// Character that separates an object from a relation in a userset.
pub const RELATION_SEPARATOR: char = '#';
/// Object id that denotes every object of a type.
pub const WILDCARD_ID: &str = "*";

/// An object identifier (e.g., "document:readme").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Object {
    /// The type portion (e.g., "document").
    pub object_type: String,
    /// The ID portion (e.g., "readme").
    pub object_id: String,
}

impl Object {
    /// Creates a new Object from type and ID.
    pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }

    /// Parses an object from "type:id" format.
    ///
    /// Both halves must be non-empty and neither may contain `#`, `@` or whitespace.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidObjectFormat {
            value: value.to_string(),
        };
        let (object_type, object_id) = value.split_once(TYPE_SEPARATOR).ok_or_else(invalid)?;
        if !is_valid_name(object_type) || !is_valid_id(object_id) {
            return Err(invalid());
        }
        Ok(Self::new(object_type, object_id))
    }

    /// Returns true if this is the `type:*` wildcard object.
    pub fn is_wildcard(&self) -> bool {
        self.object_id == WILDCARD_ID
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

impl FromStr for Object {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The subject of a tuple or of a check.
///
/// - `Object`: a concrete subject such as `user:alice`
/// - `Userset`: everyone holding `relation` on `object`, e.g. `group:eng#member`
/// - `Wildcard`: every subject of a type, `user:*`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum User {
    Object(Object),
    Userset { object: Object, relation: String },
    Wildcard { user_type: String },
}

impl User {
    /// Parses `type:id`, `type:id#relation` or `type:*`.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidUserFormat {
            value: value.to_string(),
        };

        if let Some((object, relation)) = value.split_once(RELATION_SEPARATOR) {
            let object = Object::parse(object).map_err(|_| invalid())?;
            if !is_valid_name(relation) || object.is_wildcard() {
                return Err(invalid());
            }
            return Ok(User::Userset {
                object,
                relation: relation.to_string(),
            });
        }

        let object = Object::parse(value).map_err(|_| invalid())?;
        if object.is_wildcard() {
            Ok(User::Wildcard {
                user_type: object.object_type,
            })
        } else {
            Ok(User::Object(object))
        }
    }

    /// Returns the type of this user.
    pub fn user_type(&self) -> &str {
        match self {
            User::Object(object) | User::Userset { object, .. } => &object.object_type,
            User::Wildcard { user_type } => user_type,
        }
    }

    /// Returns true if a tuple naming `self` as its user grants `requesting` directly.
    ///
    /// A stored wildcard matches any concrete user of its type. A wildcard as the
    /// requesting user never matches.
    pub fn grants(&self, requesting: &User) -> bool {
        match (self, requesting) {
            (_, User::Wildcard { .. }) => false,
            (User::Wildcard { user_type }, User::Object(object)) => {
                *user_type == object.object_type
            }
            (stored, requesting) => stored == requesting,
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            User::Object(object) => write!(f, "{object}"),
            User::Userset { object, relation } => write!(f, "{object}#{relation}"),
            User::Wildcard { user_type } => write!(f, "{user_type}:{WILDCARD_ID}"),
        }
    }
}

impl FromStr for User {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for User {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for User {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        User::parse(&value).map_err(serde::de::Error::custom)
    }
}

/// A relationship tuple: `user` holds `relation` on `object`.
///
/// Textual form is `object#relation@user`, e.g. `document:1#viewer@user:alice`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tuple {
    pub object: Object,
    pub relation: String,
    pub user: User,
}

impl Tuple {
    /// Creates a new Tuple.
    pub fn new(object: Object, relation: impl Into<String>, user: User) -> Self {
        Self {
            object,
            relation: relation.into(),
            user,
        }
    }

    /// Parses and validates the three parts of a tuple.
    pub fn from_parts(user: &str, relation: &str, object: &str) -> Result<Self, DomainError> {
        let user = User::parse(user)?;
        let object = Object::parse(object)?;
        if !is_valid_name(relation) {
            return Err(DomainError::InvalidRelationFormat {
                value: relation.to_string(),
            });
        }
        Ok(Self::new(object, relation, user))
    }

    /// Parses the `object#relation@user` form.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidContextualTuple {
            message: format!("expected 'type:id#relation@user', got '{value}'"),
        };
        let (lhs, user) = value.split_once('@').ok_or_else(invalid)?;
        let (object, relation) = lhs.split_once(RELATION_SEPARATOR).ok_or_else(invalid)?;
        Self::from_parts(user, relation, object)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object, self.relation, self.user)
    }
}

impl FromStr for Tuple {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A userset rewrite: how membership in a relation is computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Users directly related by stored (or contextual) tuples.
    This,
    /// Same object, another relation.
    ComputedUserset { relation: String },
    /// Follow `tupleset` to parent objects, then evaluate `computed_userset` there.
    TupleToUserset {
        tupleset: String,
        computed_userset: String,
    },
    Union { children: Vec<Rewrite> },
    Intersection { children: Vec<Rewrite> },
    Difference {
        base: Box<Rewrite>,
        subtract: Box<Rewrite>,
    },
}

impl Rewrite {
    pub fn computed(relation: impl Into<String>) -> Self {
        Rewrite::ComputedUserset {
            relation: relation.into(),
        }
    }

    pub fn tuple_to_userset(tupleset: impl Into<String>, computed: impl Into<String>) -> Self {
        Rewrite::TupleToUserset {
            tupleset: tupleset.into(),
            computed_userset: computed.into(),
        }
    }

    pub fn union(children: Vec<Rewrite>) -> Self {
        Rewrite::Union { children }
    }

    pub fn intersection(children: Vec<Rewrite>) -> Self {
        Rewrite::Intersection { children }
    }

    pub fn difference(base: Rewrite, subtract: Rewrite) -> Self {
        Rewrite::Difference {
            base: Box::new(base),
            subtract: Box::new(subtract),
        }
    }
}

/// A type definition: a type name and its relation rewrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub type_name: String,
    /// Relations keyed by name. Ordered so serialization is deterministic.
    pub relations: BTreeMap<String, Rewrite>,
}

impl TypeDefinition {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relations: BTreeMap::new(),
        }
    }

    /// Adds a relation, replacing any previous rewrite with the same name.
    pub fn with_relation(mut self, name: impl Into<String>, rewrite: Rewrite) -> Self {
        self.relations.insert(name.into(), rewrite);
        self
    }
}

/// An authorization model defining types and their relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationModel {
    /// Assigned by the model repository when the model is written.
    pub id: Option<String>,
    /// Schema version (e.g., "1.0").
    pub schema_version: String,
    pub type_definitions: Vec<TypeDefinition>,
}

impl AuthorizationModel {
    /// Schema version of models produced by the DSL parser.
    pub const DEFAULT_SCHEMA_VERSION: &'static str = "1.0";

    pub fn new(type_definitions: Vec<TypeDefinition>) -> Self {
        Self {
            id: None,
            schema_version: Self::DEFAULT_SCHEMA_VERSION.to_string(),
            type_definitions,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Returns true if `value` is usable as a type or relation name.
pub fn is_valid_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Returns true if `value` is usable as an object id.
fn is_valid_id(value: &str) -> bool {
    !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || c == RELATION_SEPARATOR || c == '@')
}
