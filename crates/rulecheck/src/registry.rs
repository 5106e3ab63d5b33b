//! Building rules from declarative configuration.
//!
//! A rule is declared as a JSON object naming the rule and its options:
//!
//! ```json
//! {"rule": "each", "inner": {"rule": "integer"}, "stop_on_first_error": false}
//! ```

use crate::error::{ConfigError, Result};
use crate::query::DataStore;
use crate::rule::Rule;
use crate::rules::{
    CompareRule, EachOptions, ExistOptions, ExistRule, IntegerRule, RequiredRule, TrimRule,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A rule name plus its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub rule: String,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl RuleConfig {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            options: Map::new(),
        }
    }

    pub fn option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

/// Creates a rule from its options.
pub type RuleFactory =
    Arc<dyn Fn(&RuleRegistry, Map<String, Value>) -> Result<Arc<dyn Rule>> + Send + Sync>;

/// Maps rule names to factories.
///
/// Rules that query a data store (`exist`) use the registry's store.
#[derive(Clone)]
pub struct RuleRegistry {
    store: Option<Arc<dyn DataStore>>,
    factories: HashMap<String, RuleFactory>,
}

impl RuleRegistry {
    /// Builder preloaded with the built-in rules.
    pub fn builder() -> RuleRegistryBuilder {
        RuleRegistryBuilder::new()
    }

    /// Built-in rules without a data store.
    pub fn with_defaults() -> Self {
        Self::builder().build()
    }

    pub fn store(&self) -> Option<&Arc<dyn DataStore>> {
        self.store.as_ref()
    }

    pub fn contains(&self, rule: &str) -> bool {
        self.factories.contains_key(rule)
    }

    /// Build a rule from its configuration.
    pub fn build(&self, config: &RuleConfig) -> Result<Arc<dyn Rule>> {
        let factory = self
            .factories
            .get(&config.rule)
            .ok_or_else(|| ConfigError::UnknownRule(config.rule.clone()))?;
        tracing::trace!(rule = %config.rule, "building rule");
        factory(self, config.options.clone())
    }

    /// Build a rule from a JSON declaration.
    pub fn build_value(&self, value: Value) -> Result<Arc<dyn Rule>> {
        let config: RuleConfig = serde_json::from_value(value).map_err(|e| {
            ConfigError::InvalidOptions {
                rule: "<declaration>".to_string(),
                reason: e.to_string(),
            }
        })?;
        self.build(&config)
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rules: Vec<_> = self.factories.keys().collect();
        rules.sort();
        f.debug_struct("RuleRegistry")
            .field("rules", &rules)
            .field("has_store", &self.store.is_some())
            .finish()
    }
}

/// Deserialize the options of a rule, reporting failures against its name.
pub fn parse_options<T: DeserializeOwned>(
    rule: &str,
    options: Map<String, Value>,
) -> std::result::Result<T, ConfigError> {
    serde_json::from_value(Value::Object(options)).map_err(|e| ConfigError::InvalidOptions {
        rule: rule.to_string(),
        reason: e.to_string(),
    })
}

/// Builder for [`RuleRegistry`].
pub struct RuleRegistryBuilder {
    store: Option<Arc<dyn DataStore>>,
    factories: HashMap<String, RuleFactory>,
}

impl RuleRegistryBuilder {
    pub fn new() -> Self {
        let builder = Self {
            store: None,
            factories: HashMap::new(),
        };
        builder
            .register("required", |_, options| {
                let rule: RequiredRule = parse_options("required", options)?;
                Ok(Arc::new(rule))
            })
            .register("integer", |_, options| {
                let rule: IntegerRule = parse_options("integer", options)?;
                Ok(Arc::new(rule))
            })
            .register("trim", |_, options| {
                let rule: TrimRule = parse_options("trim", options)?;
                Ok(Arc::new(rule))
            })
            .register("compare", |_, options| {
                let rule: CompareRule = parse_options("compare", options)?;
                Ok(Arc::new(rule))
            })
            .register("exist", |registry, options| {
                let store = registry
                    .store()
                    .cloned()
                    .ok_or_else(|| ConfigError::MissingStore("exist".to_string()))?;
                let options: ExistOptions = parse_options("exist", options)?;
                Ok(Arc::new(ExistRule::from_options(store, options)?))
            })
            .register("each", |registry, options| {
                let options: EachOptions = parse_options("each", options)?;
                let inner = registry.build(&options.inner)?;
                Ok(Arc::new(options.into_rule(inner)))
            })
    }

    /// Data store handed to store-backed rules.
    pub fn store(mut self, store: impl DataStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn shared_store(mut self, store: Arc<dyn DataStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register a factory, replacing any previous one of the same name.
    pub fn register<F>(mut self, rule: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&RuleRegistry, Map<String, Value>) -> Result<Arc<dyn Rule>> + Send + Sync + 'static,
    {
        self.factories.insert(rule.into(), Arc::new(factory));
        self
    }

    pub fn build(self) -> RuleRegistry {
        RuleRegistry {
            store: self.store,
            factories: self.factories,
        }
    }
}

impl Default for RuleRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, RuleError};
    use crate::memory::MemoryStore;
    use crate::model::{DynamicModel, Model};
    use crate::rule::RuleResult;
    use serde_json::json;

    fn registry() -> RuleRegistry {
        RuleRegistry::builder()
            .store(MemoryStore::new().table(
                "product_types",
                vec![json!({"id": 1}), json!({"id": 2})],
            ))
            .build()
    }

    #[test]
    fn builds_builtin_rules() {
        let registry = registry();
        for name in ["required", "integer", "trim", "compare", "exist", "each"] {
            assert!(registry.contains(name), "{name}");
        }
        let rule = registry.build(&RuleConfig::new("integer")).unwrap();
        assert_eq!(rule.rule_name(), "integer");
        assert!(rule.validate(&json!("x")).unwrap().is_fail());
    }

    #[test]
    fn each_resolves_inner_rule() {
        let rule = registry()
            .build_value(json!({
                "rule": "each",
                "inner": {"rule": "integer", "skip_on_empty": false},
                "stop_on_first_error": false,
            }))
            .unwrap();

        let mut model = DynamicModel::with_attributes("m", json!({"items": ["a", "", 3]}));
        rule.validate_attribute(&mut model, "items").unwrap();
        assert_eq!(model.errors().count("items"), 2);
    }

    #[test]
    fn exist_uses_registry_store() {
        let rule = registry()
            .build_value(json!({
                "rule": "exist",
                "target_resource": "product_types",
                "target_attribute": "id",
            }))
            .unwrap();
        assert!(rule.validate(&json!(2)).unwrap().is_pass());
        assert!(rule.validate(&json!(9)).unwrap().is_fail());
    }

    #[test]
    fn exist_without_store_is_config_error() {
        let result = RuleRegistry::with_defaults().build_value(json!({
            "rule": "exist",
            "target_resource": "product_types",
        }));
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingStore(_)))
        ));
    }

    #[test]
    fn unknown_rule_and_bad_options() {
        let registry = RuleRegistry::with_defaults();
        assert!(matches!(
            registry.build(&RuleConfig::new("email")),
            Err(Error::Config(ConfigError::UnknownRule(name))) if name == "email"
        ));
        assert!(matches!(
            registry.build(&RuleConfig::new("integer").option("strict", json!(true))),
            Err(Error::Config(ConfigError::InvalidOptions { rule, .. })) if rule == "integer"
        ));
    }

    #[test]
    fn custom_factories() {
        #[derive(Debug)]
        struct Never;

        impl Rule for Never {
            fn rule_name(&self) -> &'static str {
                "never"
            }

            fn validate_value(&self, _value: &Value) -> Result<RuleResult> {
                Ok(RuleResult::Fail(RuleError::new("never", "{attribute} never passes")))
            }
        }

        let registry = RuleRegistry::builder()
            .register("never", |_, _| Ok(Arc::new(Never)))
            .build();
        let rule = registry
            .build_value(json!({"rule": "each", "inner": {"rule": "never"}}))
            .unwrap();
        assert!(rule.validate(&json!([1])).unwrap().is_fail());
    }
}
