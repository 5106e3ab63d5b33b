//! Existence validation: the value must be found in a backing resource.
//!
//! Typically used to check that a foreign key points at an existing record.
//!
//! ```rust,ignore
//! // type_id must exist in column "id" of "product_types"
//! let rule = ExistRule::builder(store.clone())
//!     .target_resource("product_types")
//!     .target_attribute(TargetAttribute::field("id"))
//!     .build()?;
//!
//! // the same through a declared relation of the model
//! let rule = ExistRule::builder(store).target_relation("type").build()?;
//! ```

use crate::condition::{apply_alias, build_condition, prepare_pairs, TargetAttribute};
use crate::error::{ConfigError, Error, Result, RuleError};
use crate::model::Model;
use crate::query::{execute, Condition, DataStore, Filter, Junction, Query};
use crate::rule::{record_error, Rule, RuleResult};
use crate::value::distinct;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

const DEFAULT_MESSAGE: &str = "{attribute} is invalid.";

/// Validates that the attribute value exists in a target resource.
///
/// Two modes, chosen once per call:
/// - relation mode, when a target relation is set: the model supplies the
///   query and the target resource/attribute settings are ignored;
/// - attribute mode otherwise: a condition is built from the target
///   attribute mapping and run against the target resource (the model's own
///   resource when none is set). Fields are qualified with the primary alias
///   of relational resources.
///
/// In array mode the value may be a list, and every distinct element must
/// be present: the distinct count of matches has to equal the number of
/// distinct inputs.
#[derive(Clone)]
pub struct ExistRule {
    store: Arc<dyn DataStore>,
    target_resource: Option<String>,
    target_attribute: Option<TargetAttribute>,
    target_relation: Option<String>,
    filter: Option<Filter>,
    allow_array: bool,
    junction: Junction,
    force_primary: bool,
    message: String,
    skip_on_empty: bool,
}

impl ExistRule {
    pub fn builder(store: Arc<dyn DataStore>) -> ExistRuleBuilder {
        ExistRuleBuilder::new(store)
    }

    /// Build from deserialized options.
    pub fn from_options(store: Arc<dyn DataStore>, options: ExistOptions) -> Result<Self> {
        let mut builder = Self::builder(store)
            .allow_array(options.allow_array)
            .junction(options.junction)
            .force_primary(options.force_primary)
            .skip_on_empty(options.skip_on_empty);
        if let Some(resource) = options.target_resource {
            builder = builder.target_resource(resource);
        }
        if let Some(target) = options.target_attribute {
            builder = builder.target_attribute(target);
        }
        if let Some(relation) = options.target_relation {
            builder = builder.target_relation(relation);
        }
        if let Some(filter) = options.filter {
            builder = builder.filter(Filter::Where(Condition::all(filter)));
        }
        if let Some(message) = options.message {
            builder = builder.message(message);
        }
        Ok(builder.build()?)
    }

    pub fn target_resource(&self) -> Option<&str> {
        self.target_resource.as_deref()
    }

    pub fn target_relation(&self) -> Option<&str> {
        self.target_relation.as_deref()
    }

    fn failure(&self, value: &Value) -> RuleError {
        RuleError::new("exist", self.message.clone()).param("value", value)
    }

    fn invalid_value(value: &Value) -> RuleError {
        RuleError::new("exist", DEFAULT_MESSAGE).param("value", value)
    }

    fn refine(&self, query: &mut dyn Query) {
        if let Some(filter) = &self.filter {
            filter.apply(query);
        }
    }

    /// Run the single existence query: an exists check for scalars, a distinct
    /// count on `field` for lists.
    fn value_exists(&self, query: &dyn Query, field: &str, value: &Value) -> Result<bool> {
        let exists = execute(&*self.store, self.force_primary, || match value {
            Value::Array(items) => {
                let expected = distinct(items).len() as u64;
                Ok(query.count_distinct(field)? == expected)
            }
            _ => query.exists(),
        })?;
        Ok(exists)
    }

    fn check_relation(
        &self,
        model: &mut dyn Model,
        attribute: &str,
        relation: &str,
    ) -> Result<()> {
        tracing::debug!(attribute, relation, "checking existence through relation");
        let mut query = model.relation_query(relation)?;
        self.refine(&mut *query);

        // Pin the store the relation query runs on, not the rule's own.
        let store = model.relation_store().unwrap_or(&*self.store);
        let exists = execute(store, self.force_primary, || query.exists())?;
        if !exists {
            let value = model.value(attribute);
            record_error(model, attribute, self.failure(&value));
        }
        Ok(())
    }

    fn check_target_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        let resource = self
            .target_resource
            .clone()
            .unwrap_or_else(|| model.resource_name().to_string());
        tracing::debug!(attribute, resource = %resource, "checking existence by attribute");

        let mut query = self.store.find(&resource).map_err(Error::Store)?;
        let mut pairs = prepare_pairs(self.target_attribute.as_ref(), &*model, attribute);
        if let Some(alias) = query.primary_alias().map(str::to_string) {
            pairs = apply_alias(pairs, &alias);
        }

        let value = model.value(attribute);
        let Some(condition) = build_condition(pairs, self.junction, self.allow_array) else {
            record_error(model, attribute, Self::invalid_value(&value));
            return Ok(());
        };
        let count_field = condition
            .pairs
            .first()
            .map(|(field, _)| field.clone())
            .unwrap_or_else(|| attribute.to_string());

        query.and_where(condition);
        self.refine(&mut *query);

        if !self.value_exists(&*query, &count_field, &value)? {
            record_error(model, attribute, self.failure(&value));
        }
        Ok(())
    }
}

impl Rule for ExistRule {
    fn rule_name(&self) -> &'static str {
        "exist"
    }

    /// Validate a bare value. Needs a target resource and a single-field
    /// target attribute; anything else is a configuration error.
    fn validate_value(&self, value: &Value) -> Result<RuleResult> {
        let resource = self
            .target_resource
            .as_deref()
            .ok_or(ConfigError::MissingTargetResource)?;
        let field = match &self.target_attribute {
            Some(TargetAttribute::Field(field)) => field.as_str(),
            Some(TargetAttribute::Fields(_)) => {
                return Err(ConfigError::CompositeTargetForValue.into())
            }
            None => return Err(ConfigError::MissingTargetAttribute.into()),
        };

        let pairs = vec![(field.to_string(), value.clone())];
        let Some(condition) = build_condition(pairs, self.junction, self.allow_array) else {
            return Ok(RuleResult::Fail(self.failure(value)));
        };

        let mut query = self.store.find(resource).map_err(Error::Store)?;
        query.and_where(condition);
        self.refine(&mut *query);

        let exists = self.value_exists(&*query, field, value)?;
        tracing::debug!(resource, field, exists, "existence checked");
        Ok(if exists {
            RuleResult::Pass
        } else {
            RuleResult::Fail(self.failure(value))
        })
    }

    fn skip_on_empty(&self) -> bool {
        self.skip_on_empty
    }

    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        if self.skip_on_empty && self.is_empty(&model.value(attribute)) {
            return Ok(());
        }
        match &self.target_relation {
            Some(relation) => self.check_relation(model, attribute, relation),
            None => self.check_target_attribute(model, attribute),
        }
    }
}

impl fmt::Debug for ExistRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExistRule")
            .field("target_resource", &self.target_resource)
            .field("target_attribute", &self.target_attribute)
            .field("target_relation", &self.target_relation)
            .field("filter", &self.filter)
            .field("allow_array", &self.allow_array)
            .field("junction", &self.junction)
            .field("force_primary", &self.force_primary)
            .field("message", &self.message)
            .finish()
    }
}

/// Builder for [`ExistRule`]. Mapping errors surface from [`build`](Self::build).
pub struct ExistRuleBuilder {
    rule: ExistRule,
}

impl ExistRuleBuilder {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            rule: ExistRule {
                store,
                target_resource: None,
                target_attribute: None,
                target_relation: None,
                filter: None,
                allow_array: false,
                junction: Junction::And,
                force_primary: true,
                message: DEFAULT_MESSAGE.to_string(),
                skip_on_empty: true,
            },
        }
    }

    /// Resource to query. Defaults to the model's own resource.
    pub fn target_resource(mut self, resource: impl Into<String>) -> Self {
        self.rule.target_resource = Some(resource.into());
        self
    }

    pub fn target_attribute(mut self, target: TargetAttribute) -> Self {
        self.rule.target_attribute = Some(target);
        self
    }

    /// Named relation of the model. Overrides resource and attribute settings.
    pub fn target_relation(mut self, relation: impl Into<String>) -> Self {
        self.rule.target_relation = Some(relation.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.rule.filter = Some(filter.into());
        self
    }

    pub fn allow_array(mut self, allow: bool) -> Self {
        self.rule.allow_array = allow;
        self
    }

    pub fn junction(mut self, junction: Junction) -> Self {
        self.rule.junction = junction;
        self
    }

    /// Route the query to the primary replica when the store can.
    pub fn force_primary(mut self, force: bool) -> Self {
        self.rule.force_primary = force;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.rule.message = message.into();
        self
    }

    pub fn skip_on_empty(mut self, skip: bool) -> Self {
        self.rule.skip_on_empty = skip;
        self
    }

    pub fn build(self) -> std::result::Result<ExistRule, ConfigError> {
        let composite = self
            .rule
            .target_attribute
            .as_ref()
            .is_some_and(TargetAttribute::is_composite);
        if self.rule.allow_array && composite {
            return Err(ConfigError::CompositeTargetWithArray);
        }
        Ok(self.rule)
    }
}

/// Serialized form of [`ExistRule`] settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExistOptions {
    #[serde(default)]
    pub target_resource: Option<String>,
    #[serde(default)]
    pub target_attribute: Option<TargetAttribute>,
    #[serde(default)]
    pub target_relation: Option<String>,
    /// Static filter merged by conjunction.
    #[serde(default)]
    pub filter: Option<Map<String, Value>>,
    #[serde(default)]
    pub allow_array: bool,
    #[serde(default)]
    pub junction: Junction,
    #[serde(default = "crate::rules::default_true")]
    pub force_primary: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "crate::rules::default_true")]
    pub skip_on_empty: bool,
}
