//! Error types: validation failures, configuration errors and store faults.
//!
//! Validation failures ([`RuleError`], collected in [`ValidationErrors`]) are
//! a normal outcome and are recorded against model attributes. Configuration
//! errors and store faults ([`Error`]) are returned to the caller and are
//! never turned into "valid".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A rule declared incorrectly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("the target resource must be set")]
    MissingTargetResource,

    #[error("the target attribute must be set")]
    MissingTargetAttribute,

    #[error("a composite target attribute cannot be combined with array mode")]
    CompositeTargetWithArray,

    #[error("the target attribute must be a single field when validating a bare value")]
    CompositeTargetForValue,

    #[error("no data store configured for rule '{0}'")]
    MissingStore(String),

    #[error("unknown rule: {0}")]
    UnknownRule(String),

    #[error("invalid options for rule '{rule}': {reason}")]
    InvalidOptions { rule: String, reason: String },

    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    #[error("either a compare attribute or a compare value must be set")]
    MissingCompareTarget,
}

/// A failure reported by the data store while executing a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("unsupported query: {0}")]
    Unsupported(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Faults that abort a validation call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A failed rule: the rule code, a message template and its placeholder values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleError {
    /// The rule code (e.g. "exist", "integer", "each")
    pub code: String,
    /// Message template with `{name}` placeholders
    pub message: String,
    /// Values substituted into the template
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, serde_json::Value>,
}

impl RuleError {
    /// Create a new rule error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            params: HashMap::new(),
        }
    }

    /// Add a placeholder value, replacing any previous one.
    pub fn param(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.params.insert(key.into(), v);
        }
        self
    }

    /// Add a placeholder value unless one is already present.
    pub fn param_or_keep(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let key = key.into();
        if !self.params.contains_key(&key) {
            if let Ok(v) = serde_json::to_value(value) {
                self.params.insert(key, v);
            }
        }
        self
    }

    /// Interpolate parameters into the message.
    ///
    /// Replaces `{param_name}` placeholders with the parameter values.
    /// Placeholders without a value are left as they are.
    pub fn interpolate_message(&self) -> String {
        let mut result = self.message.clone();
        for (key, value) in &self.params {
            let placeholder = format!("{{{}}}", key);
            result = result.replace(&placeholder, &crate::value::display(value));
        }
        result
    }
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.interpolate_message())
    }
}

impl std::error::Error for RuleError {}

/// Validation errors accumulated on a model, keyed by attribute.
///
/// Errors for one attribute keep the order in which they were recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrors {
    #[serde(flatten)]
    pub fields: HashMap<String, Vec<RuleError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error for an attribute.
    pub fn add(&mut self, attribute: impl Into<String>, error: RuleError) {
        self.fields.entry(attribute.into()).or_default().push(error);
    }

    /// Merge another collection into this one.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (attribute, errors) in other.fields {
            self.fields.entry(attribute).or_default().extend(errors);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(|errors| errors.is_empty())
    }

    /// Total number of errors across all attributes.
    pub fn len(&self) -> usize {
        self.fields.values().map(|v| v.len()).sum()
    }

    /// Errors recorded for an attribute, in recording order.
    pub fn get(&self, attribute: &str) -> &[RuleError] {
        self.fields
            .get(attribute)
            .map(|errors| errors.as_slice())
            .unwrap_or(&[])
    }

    pub fn count(&self, attribute: &str) -> usize {
        self.get(attribute).len()
    }

    pub fn has(&self, attribute: &str) -> bool {
        self.count(attribute) > 0
    }

    /// The first interpolated message recorded for an attribute.
    pub fn first(&self, attribute: &str) -> Option<String> {
        self.get(attribute).first().map(RuleError::interpolate_message)
    }

    /// All interpolated messages recorded for an attribute.
    pub fn messages(&self, attribute: &str) -> Vec<String> {
        self.get(attribute)
            .iter()
            .map(RuleError::interpolate_message)
            .collect()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Remove the errors of one attribute.
    pub fn clear_attribute(&mut self, attribute: &str) {
        self.fields.remove(attribute);
    }

    /// `Ok` if no errors were recorded.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: {} error(s)", self.len())
    }
}

impl std::error::Error for ValidationErrors {}
