//! Attaching rules to model attributes, per scenario.

use crate::error::Result;
use crate::model::Model;
use crate::registry::{RuleConfig, RuleRegistry};
use crate::rule::Rule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The situation a model is validated in (e.g. "create", "update").
///
/// Rules declared for [`Scenario::Default`] apply in every scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scenario {
    #[default]
    Default,
    Named(String),
}

impl Scenario {
    pub fn named(name: impl Into<String>) -> Self {
        Self::from(name.into())
    }

    /// Whether a rule declared for `self` applies when validating `active`.
    pub fn matches(&self, active: &Scenario) -> bool {
        match (self, active) {
            (Scenario::Default, _) => true,
            (a, b) => a == b,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Scenario::Default => "default",
            Scenario::Named(name) => name,
        }
    }
}

impl From<String> for Scenario {
    fn from(name: String) -> Self {
        if name == "default" {
            Scenario::Default
        } else {
            Scenario::Named(name)
        }
    }
}

impl From<&str> for Scenario {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<Scenario> for String {
    fn from(scenario: Scenario) -> Self {
        scenario.name().to_string()
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A rule bound to attributes and scenarios.
#[derive(Debug, Clone)]
pub struct RuleEntry {
    pub attributes: Vec<String>,
    pub rule: Arc<dyn Rule>,
    /// Scenarios the entry applies in; empty means all.
    pub scenarios: Vec<Scenario>,
}

impl RuleEntry {
    pub fn applies_in(&self, scenario: &Scenario) -> bool {
        self.scenarios.is_empty() || self.scenarios.iter().any(|s| s.matches(scenario))
    }
}

/// Declarative form of a [`RuleEntry`].
///
/// ```json
/// {"attributes": ["tags"], "rule": "each", "inner": {"rule": "integer"}, "on": ["create"]}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RuleEntryConfig {
    pub attributes: Vec<String>,
    #[serde(default)]
    pub on: Vec<Scenario>,
    #[serde(flatten)]
    pub rule: RuleConfig,
}

/// Ordered rules for a model.
///
/// ```
/// use rulecheck::prelude::*;
/// use serde_json::json;
///
/// let rules = RuleSet::new()
///     .rule(["name"], RequiredRule::new())
///     .rule(["tags"], EachRule::new(IntegerRule::new()));
///
/// let mut model = DynamicModel::with_attributes("posts", json!({"name": "", "tags": [1, "x"]}));
/// assert!(!rules.validate(&mut model, &Scenario::Default).unwrap());
/// assert!(model.has_errors("name"));
/// assert!(model.has_errors("tags"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    entries: Vec<RuleEntry>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule for the attributes, active in every scenario.
    pub fn rule<I, S>(self, attributes: I, rule: impl Rule + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule_on(attributes, Arc::new(rule), Vec::new())
    }

    /// Add a shared rule restricted to the given scenarios.
    pub fn rule_on<I, S>(mut self, attributes: I, rule: Arc<dyn Rule>, scenarios: Vec<Scenario>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.push(RuleEntry {
            attributes: attributes.into_iter().map(Into::into).collect(),
            rule,
            scenarios,
        });
        self
    }

    /// Build a rule set from declarations.
    pub fn from_config(
        registry: &RuleRegistry,
        entries: impl IntoIterator<Item = RuleEntryConfig>,
    ) -> Result<Self> {
        let mut set = Self::new();
        for entry in entries {
            let rule = registry.build(&entry.rule)?;
            set = set.rule_on(entry.attributes, rule, entry.on);
        }
        Ok(set)
    }

    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    /// Entries that apply in a scenario, in declaration order.
    pub fn active<'a>(&'a self, scenario: &'a Scenario) -> impl Iterator<Item = &'a RuleEntry> {
        self.entries.iter().filter(move |e| e.applies_in(scenario))
    }

    /// Clear the model's errors and run every active rule on its attributes.
    ///
    /// Returns whether the model is valid. Configuration and store faults
    /// abort the run.
    pub fn validate(&self, model: &mut dyn Model, scenario: &Scenario) -> Result<bool> {
        model.clear_errors();
        tracing::debug!(
            resource = model.resource_name(),
            scenario = %scenario,
            "validating model"
        );
        for entry in self.active(scenario) {
            for attribute in &entry.attributes {
                entry.rule.validate_attribute(model, attribute)?;
            }
        }
        Ok(model.errors().is_empty())
    }

    /// Validate only the listed attributes.
    pub fn validate_attributes(
        &self,
        model: &mut dyn Model,
        scenario: &Scenario,
        attributes: &[&str],
    ) -> Result<bool> {
        for attribute in attributes {
            model.errors_mut().clear_attribute(attribute);
        }
        for entry in self.active(scenario) {
            for attribute in entry
                .attributes
                .iter()
                .filter(|a| attributes.contains(&a.as_str()))
            {
                entry.rule.validate_attribute(model, attribute)?;
            }
        }
        Ok(attributes.iter().all(|a| !model.has_errors(a)))
    }
}
