//! # rulecheck
//!
//! Validation rules for dynamic models.
//!
//! ## Features
//!
//! - Existence checks against a backing store (foreign keys, composite keys,
//!   lists of keys, declared relations)
//! - Per-element validation of collection attributes, with filters writing
//!   normalized elements back
//! - Messages with `{attribute}` and `{value}` placeholders
//! - Rules declared as JSON and built through a registry
//! - Scenario-scoped rule sets
//!
//! ## Example
//!
//! ```
//! use rulecheck::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let store = MemoryStore::new().table(
//!     "product_types",
//!     vec![json!({"id": 1}), json!({"id": 2})],
//! );
//!
//! let exist = ExistRule::builder(Arc::new(store))
//!     .target_resource("product_types")
//!     .target_attribute(TargetAttribute::field("id"))
//!     .allow_array(true)
//!     .build()
//!     .unwrap();
//!
//! let rules = RuleSet::new()
//!     .rule(["type_ids"], exist)
//!     .rule(["scores"], EachRule::new(IntegerRule::new()));
//!
//! let mut product = DynamicModel::with_attributes(
//!     "products",
//!     json!({"type_ids": [1, 2, 5], "scores": [10, "high"]}),
//! );
//! assert!(!rules.validate(&mut product, &Scenario::Default).unwrap());
//! assert_eq!(product.first_error("type_ids").as_deref(), Some("type_ids is invalid."));
//! assert_eq!(product.first_error("scores").as_deref(), Some("scores must be an integer."));
//! ```

pub mod condition;
pub mod error;
pub mod memory;
pub mod model;
pub mod query;
pub mod registry;
pub mod rule;
pub mod rules;
pub mod ruleset;
pub mod value;

#[cfg(test)]
mod tests;

pub use condition::{FieldMapping, TargetAttribute};
pub use error::{ConfigError, Error, Result, RuleError, StoreError, ValidationErrors};
pub use memory::MemoryStore;
pub use model::{DynamicModel, Model, Relation};
pub use query::{Condition, DataStore, Filter, Junction, PrimaryRouting, Query};
pub use registry::{RuleConfig, RuleRegistry, RuleRegistryBuilder};
pub use rule::{Rule, RuleResult, ValidationContext};
pub use rules::*;
pub use ruleset::{RuleEntry, RuleEntryConfig, RuleSet, Scenario};

/// Prelude module
pub mod prelude {
    pub use crate::condition::{FieldMapping, TargetAttribute};
    pub use crate::error::{ConfigError, Error, Result, RuleError, StoreError, ValidationErrors};
    pub use crate::memory::MemoryStore;
    pub use crate::model::{DynamicModel, Model, Relation};
    pub use crate::query::{Condition, DataStore, Filter, Junction, Query};
    pub use crate::registry::{RuleConfig, RuleRegistry};
    pub use crate::rule::{Rule, RuleResult, ValidationContext};
    pub use crate::rules::*;
    pub use crate::ruleset::{RuleSet, Scenario};
}
