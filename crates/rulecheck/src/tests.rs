//! Property-based tests for the built-in rules.

#[cfg(test)]
mod property_tests {
    use crate::condition::TargetAttribute;
    use crate::memory::MemoryStore;
    use crate::model::{DynamicModel, Model};
    use crate::rule::Rule;
    use crate::rules::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn id_rule(ids: &BTreeSet<i64>, allow_array: bool) -> ExistRule {
        let rows = ids.iter().map(|id| json!({"id": id})).collect();
        ExistRule::builder(Arc::new(MemoryStore::new().table("types", rows)))
            .target_resource("types")
            .target_attribute(TargetAttribute::field("id"))
            .allow_array(allow_array)
            .build()
            .unwrap()
    }

    // Elements are either integers or words that can never parse as one.
    fn element_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            (-1000i64..1000).prop_map(|n| json!(n)),
            "[a-z]{1,8}".prop_map(Value::String),
        ]
    }

    fn padded_strategy() -> impl Strategy<Value = Value> {
        ("[ ]{0,2}", "[a-z0-9]{0,6}", "[ ]{0,2}")
            .prop_map(|(l, word, r)| Value::String(format!("{l}{word}{r}")))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // A scalar exists exactly when it is stored.
        #[test]
        fn scalar_existence(ids in prop::collection::btree_set(0i64..50, 0..10), candidate in 0i64..50) {
            let rule = id_rule(&ids, false);
            let passed = rule.validate_value(&json!(candidate)).unwrap().is_pass();
            prop_assert_eq!(passed, ids.contains(&candidate));
        }

        // A list passes exactly when every distinct element is stored,
        // duplicates included.
        #[test]
        fn list_existence(
            ids in prop::collection::btree_set(0i64..30, 0..10),
            input in prop::collection::vec(0i64..30, 1..8),
        ) {
            let rule = id_rule(&ids, true);
            let passed = rule.validate_value(&json!(input)).unwrap().is_pass();
            prop_assert_eq!(passed, input.iter().all(|id| ids.contains(id)));
        }

        // Without stopping, each failing element is recorded once, in order.
        #[test]
        fn each_counts_failing_elements(items in prop::collection::vec(element_strategy(), 1..10)) {
            let expected = items.iter().filter(|v| v.is_string()).count();
            let mut model = DynamicModel::with_attributes("m", json!({"items": items}));
            EachRule::new(IntegerRule::new())
                .stop_on_first_error(false)
                .validate_attribute(&mut model, "items")
                .unwrap();
            prop_assert_eq!(model.errors().count("items"), expected);

            let mut model = DynamicModel::with_attributes("m", json!({"items": items}));
            EachRule::new(IntegerRule::new())
                .validate_attribute(&mut model, "items")
                .unwrap();
            prop_assert_eq!(model.errors().count("items"), expected.min(1));
        }

        // Running a filtering each rule twice changes nothing the second time.
        #[test]
        fn each_is_idempotent(items in prop::collection::vec(padded_strategy(), 1..8)) {
            let rule = EachRule::new(TrimRule::new());
            let mut model = DynamicModel::with_attributes("m", json!({"items": items}));

            rule.validate_attribute(&mut model, "items").unwrap();
            let once = model.value("items");
            let errors = model.errors().clone();

            rule.validate_attribute(&mut model, "items").unwrap();
            prop_assert_eq!(model.value("items"), once.clone());
            prop_assert_eq!(model.errors(), &errors);

            let trimmed: Vec<Value> = items
                .iter()
                .map(|v| json!(v.as_str().unwrap_or_default().trim()))
                .collect();
            prop_assert_eq!(once, Value::Array(trimmed));
        }
    }
}
