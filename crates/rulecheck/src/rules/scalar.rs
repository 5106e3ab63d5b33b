//! Rules over a single scalar value.

use crate::error::{ConfigError, Result, RuleError};
use crate::rule::{Rule, RuleResult, ValidationContext};
use crate::value::{as_number, display, is_empty, loose_eq};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::OnceLock;

static INTEGER_REGEX: OnceLock<Regex> = OnceLock::new();

fn integer_regex() -> &'static Regex {
    INTEGER_REGEX
        .get_or_init(|| Regex::new(r"^\s*[+-]?[0-9]+\s*$").expect("integer pattern is valid"))
}

/// Required (non-blank) validation rule.
///
/// Fails on null, an empty list and strings that are empty after trimming.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RequiredRule {
    /// Custom error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RequiredRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

impl Rule for RequiredRule {
    fn rule_name(&self) -> &'static str {
        "required"
    }

    fn validate_value(&self, value: &Value) -> Result<RuleResult> {
        let blank = match value {
            Value::String(s) => s.trim().is_empty(),
            other => is_empty(other),
        };
        if !blank {
            return Ok(RuleResult::Pass);
        }
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| "{attribute} cannot be blank.".to_string());
        Ok(RuleResult::Fail(RuleError::new("required", message)))
    }

    fn skip_on_empty(&self) -> bool {
        false
    }
}

/// Integer validation rule.
///
/// Accepts JSON integers, floats without a fractional part and strings of
/// digits with an optional sign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IntegerRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default = "crate::rules::default_true")]
    pub skip_on_empty: bool,
}

impl Default for IntegerRule {
    fn default() -> Self {
        Self {
            message: None,
            skip_on_empty: true,
        }
    }
}

impl IntegerRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn skip_on_empty(mut self, skip: bool) -> Self {
        self.skip_on_empty = skip;
        self
    }

    fn is_integer(value: &Value) -> bool {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => true,
            Value::Number(n) => n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0),
            Value::String(s) => integer_regex().is_match(s),
            _ => false,
        }
    }
}

impl Rule for IntegerRule {
    fn rule_name(&self) -> &'static str {
        "integer"
    }

    fn validate_value(&self, value: &Value) -> Result<RuleResult> {
        if Self::is_integer(value) {
            return Ok(RuleResult::Pass);
        }
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| "{attribute} must be an integer.".to_string());
        Ok(RuleResult::Fail(
            RuleError::new("integer", message).param("value", value),
        ))
    }

    fn skip_on_empty(&self) -> bool {
        self.skip_on_empty
    }
}

/// Filter that trims surrounding whitespace from strings. Never fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TrimRule {}

impl TrimRule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Rule for TrimRule {
    fn rule_name(&self) -> &'static str {
        "trim"
    }

    fn validate_value(&self, _value: &Value) -> Result<RuleResult> {
        Ok(RuleResult::Pass)
    }

    fn skip_on_empty(&self) -> bool {
        false
    }

    fn normalize(&self, value: &mut Value) {
        if let Value::String(s) = value {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
    }
}

/// Comparison operator for [`CompareRule`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOperator {
    #[default]
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "===")]
    Identical,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "!==")]
    NotIdentical,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
}

impl CompareOperator {
    fn message(self) -> &'static str {
        match self {
            CompareOperator::Equal | CompareOperator::Identical => {
                "{attribute} must be equal to \"{compare_value_or_attribute}\"."
            }
            CompareOperator::NotEqual | CompareOperator::NotIdentical => {
                "{attribute} must not be equal to \"{compare_value_or_attribute}\"."
            }
            CompareOperator::Greater => {
                "{attribute} must be greater than \"{compare_value_or_attribute}\"."
            }
            CompareOperator::GreaterOrEqual => {
                "{attribute} must be greater than or equal to \"{compare_value_or_attribute}\"."
            }
            CompareOperator::Less => {
                "{attribute} must be less than \"{compare_value_or_attribute}\"."
            }
            CompareOperator::LessOrEqual => {
                "{attribute} must be less than or equal to \"{compare_value_or_attribute}\"."
            }
        }
    }
}

/// How [`CompareRule`] orders values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareType {
    #[default]
    String,
    Number,
}

/// Compares a value with a fixed value or with another attribute.
///
/// Without either, an attribute is compared with `<attribute>_repeat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CompareRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_value: Option<Value>,
    #[serde(default)]
    pub operator: CompareOperator,
    #[serde(default, rename = "type")]
    pub compare_type: CompareType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default = "crate::rules::default_true")]
    pub skip_on_empty: bool,
}

impl Default for CompareRule {
    fn default() -> Self {
        Self {
            compare_attribute: None,
            compare_value: None,
            operator: CompareOperator::Equal,
            compare_type: CompareType::String,
            message: None,
            skip_on_empty: true,
        }
    }
}

impl CompareRule {
    pub fn with_attribute(attribute: impl Into<String>) -> Self {
        Self {
            compare_attribute: Some(attribute.into()),
            ..Self::default()
        }
    }

    pub fn with_value(value: Value) -> Self {
        Self {
            compare_value: Some(value),
            ..Self::default()
        }
    }

    pub fn operator(mut self, operator: CompareOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn compare_type(mut self, compare_type: CompareType) -> Self {
        self.compare_type = compare_type;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn order(&self, value: &Value, target: &Value) -> Option<Ordering> {
        match self.compare_type {
            CompareType::String => Some(display(value).cmp(&display(target))),
            CompareType::Number => {
                let a = as_number(value)?;
                let b = as_number(target)?;
                a.partial_cmp(&b)
            }
        }
    }

    fn holds(&self, value: &Value, target: &Value) -> bool {
        let equal = match self.compare_type {
            CompareType::String => display(value) == display(target),
            CompareType::Number => loose_eq(value, target),
        };
        let order = self.order(value, target);
        match self.operator {
            CompareOperator::Equal => equal,
            CompareOperator::NotEqual => !equal,
            CompareOperator::Identical => value == target,
            CompareOperator::NotIdentical => value != target,
            CompareOperator::Greater => order == Some(Ordering::Greater),
            CompareOperator::GreaterOrEqual => {
                matches!(order, Some(Ordering::Greater | Ordering::Equal))
            }
            CompareOperator::Less => order == Some(Ordering::Less),
            CompareOperator::LessOrEqual => matches!(order, Some(Ordering::Less | Ordering::Equal)),
        }
    }

    fn check(&self, value: &Value, target: &Value, label: String) -> RuleResult {
        if self.holds(value, target) {
            return RuleResult::Pass;
        }
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| self.operator.message().to_string());
        RuleResult::Fail(
            RuleError::new("compare", message)
                .param("value", value)
                .param("compare_value", target)
                .param("compare_value_or_attribute", label),
        )
    }
}

impl Rule for CompareRule {
    fn rule_name(&self) -> &'static str {
        "compare"
    }

    /// Only a fixed compare value is available to a bare value.
    fn validate_value(&self, value: &Value) -> Result<RuleResult> {
        let target = self
            .compare_value
            .as_ref()
            .ok_or(ConfigError::MissingCompareTarget)?;
        Ok(self.check(value, target, display(target)))
    }

    fn skip_on_empty(&self) -> bool {
        self.skip_on_empty
    }

    fn validate_element(&self, value: &mut Value, ctx: ValidationContext<'_>) -> Result<RuleResult> {
        if self.skip_on_empty && self.is_empty(value) {
            return Ok(RuleResult::Pass);
        }
        if self.compare_value.is_some() || ctx.model().is_none() {
            return self.validate_value(value);
        }

        let attribute = match (&self.compare_attribute, ctx.attribute()) {
            (Some(name), _) => name.clone(),
            (None, Some(attribute)) => format!("{attribute}_repeat"),
            (None, None) => return Err(ConfigError::MissingCompareTarget.into()),
        };
        let target = ctx.sibling(&attribute).cloned().unwrap_or(Value::Null);
        Ok(self.check(value, &target, attribute))
    }
}
