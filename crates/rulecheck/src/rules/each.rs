//! Applying one rule to every element of a collection.

use crate::error::{Result, RuleError};
use crate::model::Model;
use crate::registry::RuleConfig;
use crate::rule::{record_error, Rule, RuleResult, ValidationContext};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Validates each element of a list attribute with an inner rule.
///
/// Elements are checked in order. Filters among inner rules rewrite the
/// elements they see, and the rewritten list is stored back on the model.
///
/// ```
/// use rulecheck::prelude::*;
/// use serde_json::json;
///
/// let rule = EachRule::new(IntegerRule::new());
/// assert!(rule.validate(&json!([1, 2, 3])).unwrap().is_pass());
/// assert!(rule.validate(&json!([1, "text", 3])).unwrap().is_fail());
/// ```
#[derive(Debug, Clone)]
pub struct EachRule {
    rule: Arc<dyn Rule>,
    allow_message_from_rule: bool,
    stop_on_first_error: bool,
    message: String,
    skip_on_empty: bool,
}

impl EachRule {
    pub fn new(rule: impl Rule + 'static) -> Self {
        Self::from_arc(Arc::new(rule))
    }

    pub fn from_arc(rule: Arc<dyn Rule>) -> Self {
        Self {
            rule,
            allow_message_from_rule: true,
            stop_on_first_error: true,
            message: "{attribute} is invalid.".to_string(),
            skip_on_empty: true,
        }
    }

    /// Report the inner rule's message instead of this rule's own.
    pub fn allow_message_from_rule(mut self, allow: bool) -> Self {
        self.allow_message_from_rule = allow;
        self
    }

    /// Stop at the first failing element when validating an attribute.
    pub fn stop_on_first_error(mut self, stop: bool) -> Self {
        self.stop_on_first_error = stop;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn skip_on_empty(mut self, skip: bool) -> Self {
        self.skip_on_empty = skip;
        self
    }

    pub fn inner(&self) -> &dyn Rule {
        self.rule.as_ref()
    }

    fn own_error(&self, value: &Value) -> RuleError {
        RuleError::new("each", self.message.clone()).param("value", value)
    }

    fn element_error(&self, error: RuleError, element: &Value) -> RuleError {
        if self.allow_message_from_rule {
            error.param_or_keep("value", element)
        } else {
            self.own_error(element)
        }
    }

    /// Run the inner rule over the elements, rewriting them in place.
    fn check_elements(
        &self,
        items: &mut [Value],
        ctx: ValidationContext<'_>,
        stop_on_first_error: bool,
    ) -> Result<Vec<RuleError>> {
        let mut failures = Vec::new();
        for (index, item) in items.iter_mut().enumerate() {
            let original = item.clone();
            if let RuleResult::Fail(error) = self.rule.validate_element(item, ctx)? {
                tracing::debug!(
                    index,
                    rule = self.rule.rule_name(),
                    "collection element failed"
                );
                failures.push(self.element_error(error, &original));
                if stop_on_first_error {
                    break;
                }
            }
        }
        Ok(failures)
    }

    fn check(&self, value: &mut Value, ctx: ValidationContext<'_>) -> Result<RuleResult> {
        match value {
            Value::Array(items) => {
                let failures = self.check_elements(items, ctx, true)?;
                Ok(failures
                    .into_iter()
                    .next()
                    .map_or(RuleResult::Pass, RuleResult::Fail))
            }
            other => Ok(RuleResult::Fail(self.own_error(other))),
        }
    }
}

impl Rule for EachRule {
    fn rule_name(&self) -> &'static str {
        "each"
    }

    /// Fails on anything but a list, and on the first failing element.
    fn validate_value(&self, value: &Value) -> Result<RuleResult> {
        let mut value = value.clone();
        self.check(&mut value, ValidationContext::detached())
    }

    fn skip_on_empty(&self) -> bool {
        self.skip_on_empty
    }

    fn validate_element(&self, value: &mut Value, ctx: ValidationContext<'_>) -> Result<RuleResult> {
        if self.skip_on_empty && self.is_empty(value) {
            return Ok(RuleResult::Pass);
        }
        self.check(value, ctx)
    }

    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        let value = model.value(attribute);
        if self.skip_on_empty && self.is_empty(&value) {
            return Ok(());
        }

        let mut items = match value {
            Value::Array(items) => items,
            other => {
                record_error(model, attribute, self.own_error(&other));
                return Ok(());
            }
        };

        let failures = self.check_elements(
            &mut items,
            ValidationContext::for_attribute(&*model, attribute),
            self.stop_on_first_error,
        )?;
        model.set_attribute(attribute, Value::Array(items));
        for error in failures {
            record_error(model, attribute, error);
        }
        Ok(())
    }
}

fn default_message() -> String {
    "{attribute} is invalid.".to_string()
}

/// Declarative options for an each rule; `inner` is resolved through the
/// registry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EachOptions {
    pub inner: RuleConfig,
    #[serde(default = "crate::rules::default_true")]
    pub allow_message_from_rule: bool,
    #[serde(default = "crate::rules::default_true")]
    pub stop_on_first_error: bool,
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default = "crate::rules::default_true")]
    pub skip_on_empty: bool,
}

impl EachOptions {
    pub fn into_rule(self, inner: Arc<dyn Rule>) -> EachRule {
        EachRule::from_arc(inner)
            .allow_message_from_rule(self.allow_message_from_rule)
            .stop_on_first_error(self.stop_on_first_error)
            .with_message(self.message)
            .skip_on_empty(self.skip_on_empty)
    }
}
