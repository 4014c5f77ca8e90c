//! Validated, indexed authorization models.

use std::collections::HashMap;

use super::{AuthorizationModel, Rewrite, TypeDefinition};
use crate::error::{DomainError, DomainResult};
use crate::validation::{ModelValidator, ValidationLimits};

/// An authorization model that passed validation, indexed for lookups.
///
/// Immutable once built. Resolvers share it behind an `Arc` so every step of
/// a single check or expand sees the same model.
#[derive(Debug, Clone)]
pub struct CompiledModel {
    model: AuthorizationModel,
    types: HashMap<String, usize>,
}

impl CompiledModel {
    /// Validates `model` against `limits` and indexes it.
    pub fn compile(model: AuthorizationModel, limits: ValidationLimits) -> DomainResult<Self> {
        ModelValidator::new(limits)
            .validate(&model)
            .map_err(|errors| DomainError::ModelValidation { errors })?;

        let types = model
            .type_definitions
            .iter()
            .enumerate()
            .map(|(i, td)| (td.type_name.clone(), i))
            .collect();
        Ok(Self { model, types })
    }

    /// Model id, if the model has been stored.
    pub fn id(&self) -> Option<&str> {
        self.model.id.as_deref()
    }

    pub fn model(&self) -> &AuthorizationModel {
        &self.model
    }

    pub fn type_definition(&self, type_name: &str) -> Option<&TypeDefinition> {
        self.types
            .get(type_name)
            .and_then(|&i| self.model.type_definitions.get(i))
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn has_relation(&self, type_name: &str, relation: &str) -> bool {
        self.type_definition(type_name)
            .is_some_and(|td| td.relations.contains_key(relation))
    }

    /// Looks up the rewrite for `type_name#relation`.
    ///
    /// # Errors
    ///
    /// `TypeNotFound` or `RelationNotFound`.
    pub fn rewrite(&self, type_name: &str, relation: &str) -> DomainResult<&Rewrite> {
        let type_def = self
            .type_definition(type_name)
            .ok_or_else(|| DomainError::TypeNotFound {
                type_name: type_name.to_string(),
            })?;
        type_def
            .relations
            .get(relation)
            .ok_or_else(|| DomainError::RelationNotFound {
                type_name: type_name.to_string(),
                relation: relation.to_string(),
            })
    }
}
