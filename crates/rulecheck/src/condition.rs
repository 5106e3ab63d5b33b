//! Turning a target attribute mapping and a model into a query condition.

use crate::model::Model;
use crate::query::{Condition, Junction};
use crate::value::is_scalar;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// One source attribute checked against one target field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: String,
    pub target: String,
}

impl FieldMapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Source and target share a name.
    pub fn same(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source: name.clone(),
            target: name,
        }
    }
}

/// Which target field(s) the validated value is looked up in.
///
/// Deserializes from `"field"` or from a list mixing bare names and
/// `{"source": "target"}` maps: `["a2", {"a1": "a3"}]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "TargetAttributeConfig")]
pub enum TargetAttribute {
    /// The attribute under validation, looked up in this target field.
    Field(String),
    /// Several source attributes looked up together.
    Fields(Vec<FieldMapping>),
}

impl TargetAttribute {
    pub fn field(name: impl Into<String>) -> Self {
        TargetAttribute::Field(name.into())
    }

    pub fn fields<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        TargetAttribute::Fields(
            pairs
                .into_iter()
                .map(|(source, target)| FieldMapping::new(source, target))
                .collect(),
        )
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, TargetAttribute::Fields(_))
    }

    pub fn single_field(&self) -> Option<&str> {
        match self {
            TargetAttribute::Field(name) => Some(name),
            TargetAttribute::Fields(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TargetAttributeConfig {
    Single(String),
    Many(Vec<FieldEntry>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldEntry {
    Same(String),
    Mapped(IndexMap<String, String>),
}

impl From<TargetAttributeConfig> for TargetAttribute {
    fn from(config: TargetAttributeConfig) -> Self {
        match config {
            TargetAttributeConfig::Single(name) => TargetAttribute::Field(name),
            TargetAttributeConfig::Many(entries) => TargetAttribute::Fields(
                entries
                    .into_iter()
                    .flat_map(|entry| match entry {
                        FieldEntry::Same(name) => vec![FieldMapping::same(name)],
                        FieldEntry::Mapped(map) => map
                            .into_iter()
                            .map(|(source, target)| FieldMapping::new(source, target))
                            .collect(),
                    })
                    .collect(),
            ),
        }
    }
}

/// Read `(target field, value)` pairs from the model.
///
/// Without a mapping the attribute is looked up under its own name.
pub fn prepare_pairs(
    target: Option<&TargetAttribute>,
    model: &dyn Model,
    attribute: &str,
) -> Vec<(String, Value)> {
    match target {
        None => vec![(attribute.to_string(), model.value(attribute))],
        Some(TargetAttribute::Field(field)) => vec![(field.clone(), model.value(attribute))],
        Some(TargetAttribute::Fields(mappings)) => mappings
            .iter()
            .map(|m| (m.target.clone(), model.value(&m.source)))
            .collect(),
    }
}

/// Prefix a field with the primary alias.
///
/// An existing `alias.` prefix is not doubled. Fields holding an expression
/// are returned unchanged since they cannot be re-aliased reliably.
pub fn qualify(field: &str, alias: &str) -> String {
    if field.contains('(') {
        return field.to_string();
    }
    let bare = field
        .strip_prefix(alias)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(field);
    format!("{alias}.{bare}")
}

/// Qualify every field of the pairs with `alias`.
pub fn apply_alias(pairs: Vec<(String, Value)>, alias: &str) -> Vec<(String, Value)> {
    pairs
        .into_iter()
        .map(|(field, value)| (qualify(&field, alias), value))
        .collect()
}

/// Join the pairs into a condition.
///
/// Returns `None` when a value is structured and array mode is off, or when
/// a value is an object or a nested list in array mode. The caller reports
/// that as an invalid value without querying.
pub fn build_condition(
    pairs: Vec<(String, Value)>,
    junction: Junction,
    allow_array: bool,
) -> Option<Condition> {
    let mut condition = Condition::new(junction);
    for (field, value) in pairs {
        let acceptable = match &value {
            Value::Array(items) if allow_array => items.iter().all(is_scalar),
            other => is_scalar(other),
        };
        if !acceptable {
            tracing::trace!(field = %field, "structured value rejected");
            return None;
        }
        condition.pairs.push((field, value));
    }
    Some(condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DynamicModel;
    use serde_json::json;

    fn model() -> DynamicModel {
        DynamicModel::with_attributes(
            "orders",
            json!({"a1": 1, "a2": "two", "tags": [1, 2]}),
        )
    }

    #[test]
    fn pairs_default_to_the_attribute_itself() {
        let pairs = prepare_pairs(None, &model(), "a1");
        assert_eq!(pairs, vec![("a1".to_string(), json!(1))]);
    }

    #[test]
    fn single_field_uses_attribute_value() {
        let target = TargetAttribute::field("id");
        let pairs = prepare_pairs(Some(&target), &model(), "a1");
        assert_eq!(pairs, vec![("id".to_string(), json!(1))]);
    }

    #[test]
    fn composite_mapping_reads_each_source() {
        let target = TargetAttribute::Fields(vec![
            FieldMapping::same("a2"),
            FieldMapping::new("a1", "a3"),
        ]);
        let pairs = prepare_pairs(Some(&target), &model(), "a1");
        assert_eq!(
            pairs,
            vec![
                ("a2".to_string(), json!("two")),
                ("a3".to_string(), json!(1)),
            ]
        );
    }

    #[test]
    fn shorthand_config_deserializes() {
        let target: TargetAttribute = serde_json::from_value(json!(["a2", {"a1": "a3"}])).unwrap();
        assert_eq!(
            target,
            TargetAttribute::Fields(vec![
                FieldMapping::same("a2"),
                FieldMapping::new("a1", "a3"),
            ])
        );

        let target: TargetAttribute = serde_json::from_value(json!("id")).unwrap();
        assert_eq!(target, TargetAttribute::field("id"));
        assert!(!target.is_composite());
    }

    #[test]
    fn mapped_entries_keep_declared_order() {
        let expected = TargetAttribute::Fields(vec![
            FieldMapping::new("z", "z2"),
            FieldMapping::new("a", "a2"),
            FieldMapping::same("m"),
        ]);

        let target: TargetAttribute =
            serde_json::from_str(r#"[{"z": "z2", "a": "a2"}, "m"]"#).unwrap();
        assert_eq!(target, expected);

        let target: TargetAttribute =
            serde_json::from_value(json!([{"z": "z2", "a": "a2"}, "m"])).unwrap();
        assert_eq!(target, expected);

        let pairs = prepare_pairs(Some(&target), &model(), "z");
        let fields: Vec<&str> = pairs.iter().map(|(field, _)| field.as_str()).collect();
        assert_eq!(fields, vec!["z2", "a2", "m"]);
    }

    #[test]
    fn qualify_prefixes_once_and_skips_expressions() {
        assert_eq!(qualify("id", "products"), "products.id");
        assert_eq!(qualify("products.id", "products"), "products.id");
        assert_eq!(qualify("LOWER(name)", "products"), "LOWER(name)");
    }

    #[test]
    fn structured_values_need_array_mode() {
        let pairs = vec![("id".to_string(), json!([1, 2]))];
        assert!(build_condition(pairs.clone(), Junction::And, false).is_none());

        let condition = build_condition(pairs, Junction::Or, true).unwrap();
        assert_eq!(condition.junction, Junction::Or);
        assert_eq!(condition.pairs[0].1, json!([1, 2]));

        let nested = vec![("id".to_string(), json!([[1]]))];
        assert!(build_condition(nested, Junction::And, true).is_none());
        let object = vec![("id".to_string(), json!({"a": 1}))];
        assert!(build_condition(object, Junction::And, true).is_none());
    }
}
