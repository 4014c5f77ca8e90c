//! JSON representation of authorization models.
//!
//! The wire shape follows the protocol form:
//!
//! ```json
//! {
//!   "schema_version": "1.0",
//!   "type_definitions": [
//!     { "type": "document",
//!       "relations": {
//!         "viewer": { "union": { "child": [
//!           { "this": {} },
//!           { "computedUserset": { "relation": "editor" } },
//!           { "tupleToUserset": {
//!               "tupleset": { "relation": "parent" },
//!               "computedUserset": { "relation": "viewer" } } }
//!         ] } }
//!       } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{AuthorizationModel, Rewrite, TypeDefinition};
use crate::error::{DomainError, DomainResult};

#[derive(Debug, Serialize, Deserialize)]
struct ModelDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default = "default_schema_version")]
    schema_version: String,
    type_definitions: Vec<TypeDefinitionDocument>,
}

fn default_schema_version() -> String {
    AuthorizationModel::DEFAULT_SCHEMA_VERSION.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct TypeDefinitionDocument {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    relations: BTreeMap<String, UsersetDocument>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Empty {}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsersetDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    this: Option<Empty>,
    #[serde(default, alias = "computed_userset", skip_serializing_if = "Option::is_none")]
    computed_userset: Option<ObjectRelationDocument>,
    #[serde(default, alias = "tuple_to_userset", skip_serializing_if = "Option::is_none")]
    tuple_to_userset: Option<TupleToUsersetDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    union: Option<UsersetsDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    intersection: Option<UsersetsDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difference: Option<DifferenceDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ObjectRelationDocument {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    object: String,
    relation: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TupleToUsersetDocument {
    tupleset: ObjectRelationDocument,
    #[serde(alias = "computed_userset")]
    computed_userset: ObjectRelationDocument,
}

#[derive(Debug, Serialize, Deserialize)]
struct UsersetsDocument {
    #[serde(default)]
    child: Vec<UsersetDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DifferenceDocument {
    base: Box<UsersetDocument>,
    subtract: Box<UsersetDocument>,
}

impl UsersetDocument {
    fn into_rewrite(self, path: &str) -> DomainResult<Rewrite> {
        let UsersetDocument {
            this,
            computed_userset,
            tuple_to_userset,
            union,
            intersection,
            difference,
        } = self;

        let set = [
            this.is_some(),
            computed_userset.is_some(),
            tuple_to_userset.is_some(),
            union.is_some(),
            intersection.is_some(),
            difference.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if set != 1 {
            return Err(DomainError::ModelParseError {
                message: format!("{path}: userset must have exactly one rewrite, found {set}"),
            });
        }

        let children = |doc: UsersetsDocument| -> DomainResult<Vec<Rewrite>> {
            doc.child
                .into_iter()
                .enumerate()
                .map(|(i, child)| child.into_rewrite(&format!("{path}.child[{i}]")))
                .collect()
        };

        if this.is_some() {
            Ok(Rewrite::This)
        } else if let Some(cu) = computed_userset {
            Ok(Rewrite::computed(cu.relation))
        } else if let Some(ttu) = tuple_to_userset {
            Ok(Rewrite::tuple_to_userset(
                ttu.tupleset.relation,
                ttu.computed_userset.relation,
            ))
        } else if let Some(doc) = union {
            Ok(Rewrite::union(children(doc)?))
        } else if let Some(doc) = intersection {
            Ok(Rewrite::intersection(children(doc)?))
        } else if let Some(doc) = difference {
            Ok(Rewrite::difference(
                doc.base.into_rewrite(&format!("{path}.base"))?,
                doc.subtract.into_rewrite(&format!("{path}.subtract"))?,
            ))
        } else {
            Err(DomainError::ModelParseError {
                message: format!("{path}: userset has no rewrite"),
            })
        }
    }

    fn from_rewrite(rewrite: &Rewrite) -> Self {
        let relation = |relation: &str| ObjectRelationDocument {
            object: String::new(),
            relation: relation.to_string(),
        };
        let children = |children: &[Rewrite]| UsersetsDocument {
            child: children.iter().map(Self::from_rewrite).collect(),
        };

        match rewrite {
            Rewrite::This => UsersetDocument {
                this: Some(Empty {}),
                ..Default::default()
            },
            Rewrite::ComputedUserset { relation: r } => UsersetDocument {
                computed_userset: Some(relation(r)),
                ..Default::default()
            },
            Rewrite::TupleToUserset {
                tupleset,
                computed_userset,
            } => UsersetDocument {
                tuple_to_userset: Some(TupleToUsersetDocument {
                    tupleset: relation(tupleset),
                    computed_userset: relation(computed_userset),
                }),
                ..Default::default()
            },
            Rewrite::Union { children: c } => UsersetDocument {
                union: Some(children(c)),
                ..Default::default()
            },
            Rewrite::Intersection { children: c } => UsersetDocument {
                intersection: Some(children(c)),
                ..Default::default()
            },
            Rewrite::Difference { base, subtract } => UsersetDocument {
                difference: Some(DifferenceDocument {
                    base: Box::new(Self::from_rewrite(base)),
                    subtract: Box::new(Self::from_rewrite(subtract)),
                }),
                ..Default::default()
            },
        }
    }
}

/// Loads a model from its JSON representation.
///
/// Produces a syntactically valid model only; run it through
/// [`crate::validation::ModelValidator`] before resolving against it.
pub fn from_json(json: &str) -> DomainResult<AuthorizationModel> {
    let document: ModelDocument =
        serde_json::from_str(json).map_err(|e| DomainError::ModelParseError {
            message: e.to_string(),
        })?;

    let type_definitions = document
        .type_definitions
        .into_iter()
        .map(|td| {
            let relations = td
                .relations
                .into_iter()
                .map(|(name, userset)| {
                    let rewrite = userset.into_rewrite(&format!("{}#{}", td.type_name, name))?;
                    Ok((name, rewrite))
                })
                .collect::<DomainResult<BTreeMap<_, _>>>()?;
            Ok(TypeDefinition {
                type_name: td.type_name,
                relations,
            })
        })
        .collect::<DomainResult<Vec<_>>>()?;

    Ok(AuthorizationModel {
        id: document.id,
        schema_version: document.schema_version,
        type_definitions,
    })
}

/// Serializes a model to its JSON representation.
pub fn to_json(model: &AuthorizationModel) -> DomainResult<String> {
    let document = ModelDocument {
        id: model.id.clone(),
        schema_version: model.schema_version.clone(),
        type_definitions: model
            .type_definitions
            .iter()
            .map(|td| TypeDefinitionDocument {
                type_name: td.type_name.clone(),
                relations: td
                    .relations
                    .iter()
                    .map(|(name, rewrite)| (name.clone(), UsersetDocument::from_rewrite(rewrite)))
                    .collect(),
            })
            .collect(),
    };
    serde_json::to_string(&document).map_err(|e| DomainError::ModelParseError {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse;

    #[test]
    fn test_from_json_reads_protocol_shape() {
        let json = r#"{
            "schema_version": "1.0",
            "type_definitions": [
                { "type": "user" },
                { "type": "document",
                  "relations": {
                    "parent": { "this": {} },
                    "editor": { "this": {} },
                    "viewer": { "union": { "child": [
                        { "this": {} },
                        { "computedUserset": { "object": "", "relation": "editor" } },
                        { "tupleToUserset": {
                            "tupleset": { "relation": "parent" },
                            "computedUserset": { "relation": "viewer" } } }
                    ] } },
                    "blocked": { "this": {} },
                    "can_view": { "difference": {
                        "base": { "computedUserset": { "relation": "viewer" } },
                        "subtract": { "computedUserset": { "relation": "blocked" } } } }
                  } }
            ]
        }"#;

        let model = from_json(json).unwrap();
        assert_eq!(model.type_definitions.len(), 2);
        let document = &model.type_definitions[1];
        assert_eq!(
            document.relations["viewer"],
            Rewrite::union(vec![
                Rewrite::This,
                Rewrite::computed("editor"),
                Rewrite::tuple_to_userset("parent", "viewer"),
            ])
        );
        assert_eq!(
            document.relations["can_view"],
            Rewrite::difference(Rewrite::computed("viewer"), Rewrite::computed("blocked"))
        );
    }

    #[test]
    fn test_from_json_accepts_snake_case_keys() {
        let json = r#"{"type_definitions": [{"type": "doc", "relations": {
            "a": {"this": {}},
            "b": {"computed_userset": {"relation": "a"}}
        }}]}"#;
        let model = from_json(json).unwrap();
        assert_eq!(model.schema_version, "1.0");
        assert_eq!(model.type_definitions[0].relations["b"], Rewrite::computed("a"));
    }

    #[test]
    fn test_from_json_rejects_ambiguous_userset() {
        let json = r#"{"type_definitions": [{"type": "doc", "relations": {
            "a": {"this": {}, "computedUserset": {"relation": "b"}}
        }}]}"#;
        let err = from_json(json).unwrap_err();
        assert!(err.to_string().contains("doc#a"), "got: {err}");
    }

    #[test]
    fn test_from_json_rejects_empty_userset() {
        let json = r#"{"type_definitions": [{"type": "doc", "relations": {"a": {}}}]}"#;
        assert!(matches!(
            from_json(json),
            Err(DomainError::ModelParseError { .. })
        ));
    }

    #[test]
    fn test_from_json_rejects_malformed_document() {
        assert!(matches!(
            from_json("{not json"),
            Err(DomainError::ModelParseError { .. })
        ));
    }

    #[test]
    fn test_dsl_model_survives_json() {
        let model = parse(
            "type document\n  relations\n    define parent as self\n    define owner as self\n    define viewer as (self or owner) but not owner and viewer from parent",
        )
        .unwrap();
        let json = to_json(&model).unwrap();
        assert_eq!(from_json(&json).unwrap(), model);
    }
}
