//! Property-based tests for model types.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::model::{from_json, parse, to_json, Object, Tuple, User};

    /// Strategy to generate valid user identifiers in type:id format
    fn valid_user_strategy() -> impl Strategy<Value = String> {
        ("[a-z]{1,10}", "[a-z0-9_]{1,20}").prop_map(|(t, id)| format!("{t}:{id}"))
    }

    /// Strategy to generate valid userset references in type:id#relation format
    fn userset_reference_strategy() -> impl Strategy<Value = String> {
        ("[a-z]{1,10}", "[a-z0-9]{1,10}", "[a-z]{1,10}")
            .prop_map(|(t, id, rel)| format!("{t}:{id}#{rel}"))
    }

    /// Relation names that never collide with DSL keywords.
    fn relation_name_strategy() -> impl Strategy<Value = String> {
        "r_[a-z]{1,8}"
    }

    proptest! {
        #[test]
        fn test_user_type_id_format_is_valid(user_str in valid_user_strategy()) {
            let user = User::parse(&user_str);
            prop_assert!(user.is_ok(), "Failed for user: {}", user_str);
            let user = user.unwrap();
            prop_assert!(matches!(user, User::Object(_)));
            prop_assert_eq!(user.to_string(), user_str);
        }

        #[test]
        fn test_user_userset_reference_is_valid(user_str in userset_reference_strategy()) {
            let user = User::parse(&user_str);
            prop_assert!(user.is_ok(), "Failed for userset: {}", user_str);
            let is_userset = matches!(user.unwrap(), User::Userset { .. });
            prop_assert!(is_userset);
        }

        #[test]
        fn test_user_without_colon_is_invalid(s in "[a-z]{1,20}") {
            prop_assert!(User::parse(&s).is_err(), "Should reject: {}", s);
        }

        #[test]
        fn test_object_parse_roundtrip(
            obj_type in "[a-z]{1,10}",
            obj_id in "[a-z0-9]{1,10}"
        ) {
            let input = format!("{obj_type}:{obj_id}");
            let obj = Object::parse(&input);
            prop_assert!(obj.is_ok());
            prop_assert_eq!(obj.unwrap().to_string(), input);
        }

        #[test]
        fn test_tuple_text_form_roundtrip(
            object in valid_user_strategy(),
            relation in relation_name_strategy(),
            user in prop_oneof![valid_user_strategy(), userset_reference_strategy()],
        ) {
            let text = format!("{object}#{relation}@{user}");
            let tuple = Tuple::parse(&text);
            prop_assert!(tuple.is_ok(), "Failed for tuple: {}", text);
            prop_assert_eq!(tuple.unwrap().to_string(), text);
        }

        #[test]
        fn test_parsed_union_survives_json(
            relations in proptest::collection::btree_set(relation_name_strategy(), 1..6)
        ) {
            let relations: Vec<String> = relations.into_iter().collect();
            let mut dsl = String::from("type doc\n  relations\n");
            for relation in &relations {
                dsl.push_str(&format!("    define {relation} as self\n"));
            }
            dsl.push_str(&format!("    define combined as {}\n", relations.join(" or ")));

            let model = parse(&dsl).unwrap();
            let json = to_json(&model).unwrap();
            prop_assert_eq!(from_json(&json).unwrap(), model);
        }
    }
}
