//! Models: attribute access, error accumulation and relations.

use crate::error::{ConfigError, Error, Result, RuleError, ValidationErrors};
use crate::query::{Condition, DataStore, Query};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What rules need from the object being validated.
pub trait Model {
    /// Resource the model itself is stored in. Existence checks without an
    /// explicit target resource query this one.
    fn resource_name(&self) -> &str;

    fn attribute(&self, name: &str) -> Option<&Value>;

    fn set_attribute(&mut self, name: &str, value: Value);

    /// A query for a named relation of this model.
    fn relation_query(&self, name: &str) -> Result<Box<dyn Query>> {
        Err(ConfigError::UnknownRelation(name.to_string()).into())
    }

    /// Store that relation queries run on, when the model has one.
    fn relation_store(&self) -> Option<&dyn DataStore> {
        None
    }

    fn errors(&self) -> &ValidationErrors;

    fn errors_mut(&mut self) -> &mut ValidationErrors;

    /// Attribute value, `Null` when unset.
    fn value(&self, name: &str) -> Value {
        self.attribute(name).cloned().unwrap_or(Value::Null)
    }

    fn add_error(&mut self, attribute: &str, error: RuleError) {
        self.errors_mut().add(attribute, error);
    }

    fn has_errors(&self, attribute: &str) -> bool {
        self.errors().has(attribute)
    }

    fn first_error(&self, attribute: &str) -> Option<String> {
        self.errors().first(attribute)
    }

    fn clear_errors(&mut self) {
        self.errors_mut().clear();
    }
}

/// A declared relation: records of `resource` whose link fields equal the
/// model's attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub resource: String,
    /// `(target field, local attribute)` pairs.
    pub link: Vec<(String, String)>,
}

impl Relation {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            link: Vec::new(),
        }
    }

    pub fn link(mut self, target: impl Into<String>, local: impl Into<String>) -> Self {
        self.link.push((target.into(), local.into()));
        self
    }
}

/// A model backed by a JSON attribute map.
#[derive(Clone, Default)]
pub struct DynamicModel {
    resource: String,
    attributes: Map<String, Value>,
    errors: ValidationErrors,
    relations: HashMap<String, Relation>,
    store: Option<Arc<dyn DataStore>>,
}

impl DynamicModel {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Default::default()
        }
    }

    /// Build a model from a JSON object. Non-object values give an empty model.
    pub fn with_attributes(resource: impl Into<String>, attributes: Value) -> Self {
        let mut model = Self::new(resource);
        if let Value::Object(map) = attributes {
            model.attributes = map;
        }
        model
    }

    /// Store used to resolve relations.
    pub fn store(mut self, store: Arc<dyn DataStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }
}

impl Model for DynamicModel {
    fn resource_name(&self) -> &str {
        &self.resource
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    fn relation_query(&self, name: &str) -> Result<Box<dyn Query>> {
        let relation = self
            .relations
            .get(name)
            .ok_or_else(|| ConfigError::UnknownRelation(name.to_string()))?;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ConfigError::MissingStore(format!("relation {name}")))?;

        let mut query = store.find(&relation.resource).map_err(Error::Store)?;
        let link = relation
            .link
            .iter()
            .map(|(target, local)| (target.clone(), self.value(local)));
        query.and_where(Condition::all(link));
        Ok(query)
    }

    fn relation_store(&self) -> Option<&dyn DataStore> {
        self.store.as_deref()
    }

    fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut ValidationErrors {
        &mut self.errors
    }
}

impl fmt::Debug for DynamicModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicModel")
            .field("resource", &self.resource)
            .field("attributes", &self.attributes)
            .field("errors", &self.errors)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .field("has_store", &self.store.is_some())
            .finish()
    }
}
