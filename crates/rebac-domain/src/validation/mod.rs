//! Authorization model validation.
//!
//! Validates that authorization models are structurally correct:
//! - Type names are unique and well formed
//! - Every computed relation exists on its type
//! - Every tupleset relation exists on its type
//! - Every tupleset target relation exists on some type
//! - The model stays within the configured size ceilings
//!
//! Rewrite cycles (`viewer` -> `editor` -> `viewer`) are accepted here.
//! They are legal in stored models and the resolver terminates them at runtime.

use std::collections::HashSet;

use crate::model::{is_valid_name, AuthorizationModel, Rewrite, TypeDefinition};

/// Validation error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty model (no type definitions)
    EmptyModel,
    /// A type name is empty or contains illegal characters
    InvalidTypeName { type_name: String },
    /// A relation name is empty or contains illegal characters
    InvalidRelationName {
        type_name: String,
        relation_name: String,
    },
    /// The same type is defined twice
    DuplicateType { type_name: String },
    /// More type definitions than allowed
    TooManyTypes { count: usize, max: usize },
    /// More (type, relation) pairs than allowed
    TooManyRelations { count: usize, max: usize },
    /// A computed userset references a relation the type does not define
    UndefinedRelation {
        type_name: String,
        relation_name: String,
        referenced_relation: String,
    },
    /// A tuple-to-userset names a tupleset relation the type does not define
    UndefinedTupleset {
        type_name: String,
        relation_name: String,
        tupleset: String,
    },
    /// A tuple-to-userset targets a relation no type defines
    UndefinedTupleToUsersetRelation {
        type_name: String,
        relation_name: String,
        computed_relation: String,
    },
    /// A union or intersection without children
    EmptyRewrite {
        type_name: String,
        relation_name: String,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyModel => {
                write!(f, "model must have at least one type definition")
            }
            ValidationError::InvalidTypeName { type_name } => {
                write!(f, "invalid type name '{}'", type_name)
            }
            ValidationError::InvalidRelationName {
                type_name,
                relation_name,
            } => write!(
                f,
                "invalid relation name '{}' in type '{}'",
                relation_name, type_name
            ),
            ValidationError::DuplicateType { type_name } => {
                write!(f, "type '{}' is defined more than once", type_name)
            }
            ValidationError::TooManyTypes { count, max } => write!(
                f,
                "model defines {} types, the maximum is {}",
                count, max
            ),
            ValidationError::TooManyRelations { count, max } => write!(
                f,
                "model defines {} relations, the maximum is {}",
                count, max
            ),
            ValidationError::UndefinedRelation {
                type_name,
                relation_name,
                referenced_relation,
            } => write!(
                f,
                "undefined relation '{}' referenced in {}#{}",
                referenced_relation, type_name, relation_name
            ),
            ValidationError::UndefinedTupleset {
                type_name,
                relation_name,
                tupleset,
            } => write!(
                f,
                "undefined tupleset relation '{}' referenced in {}#{}",
                tupleset, type_name, relation_name
            ),
            ValidationError::UndefinedTupleToUsersetRelation {
                type_name,
                relation_name,
                computed_relation,
            } => write!(
                f,
                "relation '{}' referenced from {}#{} is not defined on any type",
                computed_relation, type_name, relation_name
            ),
            ValidationError::EmptyRewrite {
                type_name,
                relation_name,
            } => write!(
                f,
                "union or intersection without children in {}#{}",
                type_name, relation_name
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, Vec<ValidationError>>;

/// Size ceilings applied to incoming models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_types: usize,
    pub max_relations: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_types: 100,
            max_relations: 1000,
        }
    }
}

/// Model validator
#[derive(Debug, Clone, Default)]
pub struct ModelValidator {
    limits: ValidationLimits,
}

impl ModelValidator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    /// Validates the model, collecting every problem found.
    pub fn validate(&self, model: &AuthorizationModel) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if model.type_definitions.is_empty() {
            return Err(vec![ValidationError::EmptyModel]);
        }

        let type_count = model.type_definitions.len();
        if type_count > self.limits.max_types {
            errors.push(ValidationError::TooManyTypes {
                count: type_count,
                max: self.limits.max_types,
            });
        }

        let relation_count: usize = model
            .type_definitions
            .iter()
            .map(|td| td.relations.len())
            .sum();
        if relation_count > self.limits.max_relations {
            errors.push(ValidationError::TooManyRelations {
                count: relation_count,
                max: self.limits.max_relations,
            });
        }

        let mut seen = HashSet::new();
        for type_def in &model.type_definitions {
            if !is_valid_name(&type_def.type_name) {
                errors.push(ValidationError::InvalidTypeName {
                    type_name: type_def.type_name.clone(),
                });
            }
            if !seen.insert(type_def.type_name.as_str()) {
                errors.push(ValidationError::DuplicateType {
                    type_name: type_def.type_name.clone(),
                });
            }
        }

        let relations_anywhere: HashSet<&str> = model
            .type_definitions
            .iter()
            .flat_map(|td| td.relations.keys().map(String::as_str))
            .collect();
        for type_def in &model.type_definitions {
            for (relation_name, rewrite) in &type_def.relations {
                if !is_valid_name(relation_name) {
                    errors.push(ValidationError::InvalidRelationName {
                        type_name: type_def.type_name.clone(),
                        relation_name: relation_name.clone(),
                    });
                }
                let scope = RelationScope {
                    type_def,
                    relation_name,
                    relations_anywhere: &relations_anywhere,
                };
                scope.validate_rewrite(rewrite, &mut errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

struct RelationScope<'a> {
    type_def: &'a TypeDefinition,
    relation_name: &'a str,
    relations_anywhere: &'a HashSet<&'a str>,
}

impl RelationScope<'_> {
    fn validate_rewrite(&self, rewrite: &Rewrite, errors: &mut Vec<ValidationError>) {
        match rewrite {
            Rewrite::This => {}
            Rewrite::ComputedUserset { relation } => {
                if !self.type_def.relations.contains_key(relation) {
                    errors.push(ValidationError::UndefinedRelation {
                        type_name: self.type_def.type_name.clone(),
                        relation_name: self.relation_name.to_string(),
                        referenced_relation: relation.clone(),
                    });
                }
            }
            Rewrite::TupleToUserset {
                tupleset,
                computed_userset,
            } => {
                if !self.type_def.relations.contains_key(tupleset) {
                    errors.push(ValidationError::UndefinedTupleset {
                        type_name: self.type_def.type_name.clone(),
                        relation_name: self.relation_name.to_string(),
                        tupleset: tupleset.clone(),
                    });
                }
                if !self.relations_anywhere.contains(computed_userset.as_str()) {
                    errors.push(ValidationError::UndefinedTupleToUsersetRelation {
                        type_name: self.type_def.type_name.clone(),
                        relation_name: self.relation_name.to_string(),
                        computed_relation: computed_userset.clone(),
                    });
                }
            }
            Rewrite::Union { children } | Rewrite::Intersection { children } => {
                if children.is_empty() {
                    errors.push(ValidationError::EmptyRewrite {
                        type_name: self.type_def.type_name.clone(),
                        relation_name: self.relation_name.to_string(),
                    });
                }
                for child in children {
                    self.validate_rewrite(child, errors);
                }
            }
            Rewrite::Difference { base, subtract } => {
                self.validate_rewrite(base, errors);
                self.validate_rewrite(subtract, errors);
            }
        }
    }
}

/// Validates a model with default limits.
pub fn validate(model: &AuthorizationModel) -> ValidationResult<()> {
    ModelValidator::default().validate(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse;

    fn create_valid_model() -> AuthorizationModel {
        parse(
            r#"
type user
type folder
  relations
    define viewer as self
type document
  relations
    define parent as self
    define owner as self
    define editor as self or owner
    define viewer as self or editor or viewer from parent
    define blocked as self
    define can_view as viewer but not blocked
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validator_accepts_valid_model() {
        assert_eq!(validate(&create_valid_model()), Ok(()));
    }

    #[test]
    fn test_validator_accepts_rewrite_cycles() {
        let model = parse(
            "type document\n  relations\n    define viewer as editor\n    define editor as viewer",
        )
        .unwrap();
        assert_eq!(validate(&model), Ok(()));
    }

    #[test]
    fn test_validator_rejects_empty_model() {
        let model = AuthorizationModel::new(vec![]);
        assert_eq!(validate(&model), Err(vec![ValidationError::EmptyModel]));
    }

    #[test]
    fn test_validator_rejects_undefined_relation_references() {
        let model = parse("type document\n  relations\n    define viewer as editor").unwrap();
        let errors = validate(&model).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UndefinedRelation {
                type_name: "document".to_string(),
                relation_name: "viewer".to_string(),
                referenced_relation: "editor".to_string(),
            }]
        );
    }

    #[test]
    fn test_validator_rejects_undefined_tupleset() {
        let model =
            parse("type document\n  relations\n    define viewer as viewer from parent").unwrap();
        let errors = validate(&model).unwrap_err();
        assert!(errors.contains(&ValidationError::UndefinedTupleset {
            type_name: "document".to_string(),
            relation_name: "viewer".to_string(),
            tupleset: "parent".to_string(),
        }));
    }

    #[test]
    fn test_validator_rejects_tuple_to_userset_relation_missing_everywhere() {
        let model = parse(
            "type document\n  relations\n    define parent as self\n    define viewer as reader from parent",
        )
        .unwrap();
        let errors = validate(&model).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UndefinedTupleToUsersetRelation {
                type_name: "document".to_string(),
                relation_name: "viewer".to_string(),
                computed_relation: "reader".to_string(),
            }]
        );
    }

    #[test]
    fn test_validator_accepts_tuple_to_userset_relation_on_other_type() {
        let model = parse(
            "type folder\n  relations\n    define reader as self\ntype document\n  relations\n    define parent as self\n    define viewer as reader from parent",
        )
        .unwrap();
        assert_eq!(validate(&model), Ok(()));
    }

    #[test]
    fn test_validator_rejects_duplicate_types() {
        let model = parse("type user\ntype user").unwrap();
        assert_eq!(
            validate(&model),
            Err(vec![ValidationError::DuplicateType {
                type_name: "user".to_string()
            }])
        );
    }

    #[test]
    fn test_validator_rejects_empty_names() {
        let model = AuthorizationModel::new(vec![
            TypeDefinition::new(""),
            TypeDefinition::new("doc").with_relation("", Rewrite::This),
        ]);
        let errors = validate(&model).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidTypeName {
            type_name: String::new()
        }));
        assert!(errors.contains(&ValidationError::InvalidRelationName {
            type_name: "doc".to_string(),
            relation_name: String::new(),
        }));
    }

    #[test]
    fn test_validator_rejects_empty_union() {
        let model = AuthorizationModel::new(vec![
            TypeDefinition::new("doc").with_relation("viewer", Rewrite::union(vec![]))
        ]);
        assert_eq!(
            validate(&model),
            Err(vec![ValidationError::EmptyRewrite {
                type_name: "doc".to_string(),
                relation_name: "viewer".to_string(),
            }])
        );
    }

    #[test]
    fn test_validator_enforces_limits() {
        let validator = ModelValidator::new(ValidationLimits {
            max_types: 2,
            max_relations: 5,
        });
        let errors = validator.validate(&create_valid_model()).unwrap_err();
        assert!(errors.contains(&ValidationError::TooManyTypes { count: 3, max: 2 }));
        assert!(errors.contains(&ValidationError::TooManyRelations { count: 7, max: 5 }));
    }

    #[test]
    fn test_validator_collects_every_error() {
        let model = parse(
            "type document\n  relations\n    define viewer as editor or owner\n    define blocked as reader from parent",
        )
        .unwrap();
        let errors = validate(&model).unwrap_err();
        assert_eq!(errors.len(), 4, "got: {errors:?}");
    }
}
