//! The rule capability shared by every validator.

use crate::error::{Result, RuleError};
use crate::model::Model;
use crate::value;
use serde_json::Value;
use std::fmt;

/// Outcome of one rule on one value.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleResult {
    Pass,
    Fail(RuleError),
}

impl RuleResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, RuleResult::Pass)
    }

    pub fn is_fail(&self) -> bool {
        !self.is_pass()
    }

    pub fn error(&self) -> Option<&RuleError> {
        match self {
            RuleResult::Pass => None,
            RuleResult::Fail(error) => Some(error),
        }
    }

    pub fn into_result(self) -> std::result::Result<(), RuleError> {
        match self {
            RuleResult::Pass => Ok(()),
            RuleResult::Fail(error) => Err(error),
        }
    }
}

impl From<std::result::Result<(), RuleError>> for RuleResult {
    fn from(result: std::result::Result<(), RuleError>) -> Self {
        match result {
            Ok(()) => RuleResult::Pass,
            Err(error) => RuleResult::Fail(error),
        }
    }
}

/// Where a value being validated comes from.
///
/// Detached values have no model; attribute values (and the elements of a
/// collection attribute) can reach sibling attributes through the model.
#[derive(Clone, Copy, Default)]
pub struct ValidationContext<'a> {
    model: Option<&'a dyn Model>,
    attribute: Option<&'a str>,
}

impl<'a> ValidationContext<'a> {
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn for_attribute(model: &'a dyn Model, attribute: &'a str) -> Self {
        Self {
            model: Some(model),
            attribute: Some(attribute),
        }
    }

    pub fn model(&self) -> Option<&'a dyn Model> {
        self.model
    }

    pub fn attribute(&self) -> Option<&'a str> {
        self.attribute
    }

    /// Another attribute of the model, if there is a model.
    pub fn sibling(&self, name: &str) -> Option<&'a Value> {
        self.model.and_then(|model| model.attribute(name))
    }
}

impl fmt::Debug for ValidationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("has_model", &self.model.is_some())
            .field("attribute", &self.attribute)
            .finish()
    }
}

/// A validation rule.
///
/// Implementors provide [`validate_value`](Rule::validate_value); the other
/// entry points derive from it. Rules hold configuration only: each call is
/// independent and leaves the rule untouched.
pub trait Rule: fmt::Debug + Send + Sync {
    /// Identifier used in error codes and the registry.
    fn rule_name(&self) -> &'static str;

    /// Validate a bare value.
    fn validate_value(&self, value: &Value) -> Result<RuleResult>;

    /// Whether empty values are skipped without a check.
    fn skip_on_empty(&self) -> bool {
        true
    }

    fn is_empty(&self, value: &Value) -> bool {
        value::is_empty(value)
    }

    /// Rewrite the value before checking it. Filters trim or cast here.
    fn normalize(&self, _value: &mut Value) {}

    /// Validate one value in place: normalize, honour skip-on-empty, check.
    fn validate_element(
        &self,
        value: &mut Value,
        _ctx: ValidationContext<'_>,
    ) -> Result<RuleResult> {
        self.normalize(value);
        if self.skip_on_empty() && self.is_empty(value) {
            return Ok(RuleResult::Pass);
        }
        self.validate_value(value)
    }

    /// Validate a detached value, without writing anything back.
    fn validate(&self, value: &Value) -> Result<RuleResult> {
        let mut value = value.clone();
        self.validate_element(&mut value, ValidationContext::detached())
    }

    /// Validate a model attribute, writing back normalized values and
    /// recording a failure on the attribute.
    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        let original = model.value(attribute);
        let mut value = original.clone();
        let result =
            self.validate_element(&mut value, ValidationContext::for_attribute(&*model, attribute))?;

        if value != original {
            model.set_attribute(attribute, value);
        }
        if let RuleResult::Fail(error) = result {
            record_error(model, attribute, error);
        }
        Ok(())
    }
}

/// Record a failure on a model attribute, binding `{attribute}`.
pub fn record_error(model: &mut dyn Model, attribute: &str, error: RuleError) {
    model.add_error(attribute, error.param_or_keep("attribute", attribute));
}
