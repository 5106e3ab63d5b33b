//! In-memory data store (not persistent, for testing/dev).
//!
//! Every write is a single map insert or row push, so a lock poisoned by a
//! panicking holder still guards consistent data and is recovered.

use crate::error::StoreError;
use crate::query::{Condition, DataStore, Junction, PrimaryRouting, Query, StoreResult};
use crate::value::{distinct, loose_eq};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

type Row = Map<String, Value>;

#[derive(Debug, Clone, Default)]
struct Resource {
    /// Relational resources are aliased by their name.
    relational: bool,
    rows: Vec<Row>,
}

/// Counts the queries routed to the primary replica.
#[derive(Debug, Default)]
pub struct MemoryRouting {
    calls: AtomicUsize,
}

impl PrimaryRouting for MemoryRouting {
    fn use_primary(&self, run: &mut dyn FnMut() -> StoreResult<()>) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        run()
    }
}

/// In-memory store holding relational tables and plain collections.
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    resources: Arc<RwLock<HashMap<String, Resource>>>,
    routing: Option<Arc<MemoryRouting>>,
    queries: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose primary-replica routing.
    pub fn with_primary_routing(mut self) -> Self {
        self.routing = Some(Arc::new(MemoryRouting::default()));
        self
    }

    /// Add a relational table. Rows that are not objects are skipped.
    pub fn table(self, name: impl Into<String>, rows: Vec<Value>) -> Self {
        self.put(name.into(), true, rows);
        self
    }

    /// Add a non-relational collection: its fields are never alias-qualified.
    pub fn collection(self, name: impl Into<String>, rows: Vec<Value>) -> Self {
        self.put(name.into(), false, rows);
        self
    }

    fn put(&self, name: String, relational: bool, rows: Vec<Value>) {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        let mut resources = self.resources.write().unwrap_or_else(PoisonError::into_inner);
        resources.insert(name, Resource { relational, rows });
    }

    /// Insert one record into an existing resource.
    pub fn insert(&self, resource: &str, row: Value) -> StoreResult<()> {
        let Value::Object(row) = row else {
            return Err(StoreError::Unsupported("records must be objects".into()));
        };
        let mut resources = self.resources.write().unwrap_or_else(PoisonError::into_inner);
        let target = resources
            .get_mut(resource)
            .ok_or_else(|| StoreError::UnknownResource(resource.to_string()))?;
        target.rows.push(row);
        Ok(())
    }

    /// Number of queries routed through the primary replica.
    pub fn primary_calls(&self) -> usize {
        self.routing
            .as_ref()
            .map(|r| r.calls.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Number of queries executed (`exists` or `count_distinct`).
    pub fn executed_queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl DataStore for MemoryStore {
    fn find(&self, resource: &str) -> StoreResult<Box<dyn Query>> {
        let resources = self.resources.read().unwrap_or_else(PoisonError::into_inner);
        let found = resources
            .get(resource)
            .ok_or_else(|| StoreError::UnknownResource(resource.to_string()))?;

        Ok(Box::new(MemoryQuery {
            resource: resource.to_string(),
            alias: found.relational.then(|| resource.to_string()),
            conditions: Vec::new(),
            resources: Arc::clone(&self.resources),
            queries: Arc::clone(&self.queries),
        }))
    }

    fn primary(&self) -> Option<&dyn PrimaryRouting> {
        self.routing.as_deref().map(|r| r as &dyn PrimaryRouting)
    }
}

/// A query over a [`MemoryStore`] resource.
#[derive(Debug)]
pub struct MemoryQuery {
    resource: String,
    alias: Option<String>,
    conditions: Vec<Condition>,
    resources: Arc<RwLock<HashMap<String, Resource>>>,
    queries: Arc<AtomicUsize>,
}

impl MemoryQuery {
    /// Conditions added so far.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn column<'f>(&self, field: &'f str) -> StoreResult<&'f str> {
        if field.contains('(') {
            return Err(StoreError::Unsupported(format!("expression '{field}'")));
        }
        let column = match &self.alias {
            Some(alias) => field
                .strip_prefix(alias.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .unwrap_or(field),
            None => field,
        };
        Ok(column)
    }

    fn pair_matches(&self, row: &Row, field: &str, expected: &Value) -> StoreResult<bool> {
        let actual = row.get(self.column(field)?).unwrap_or(&Value::Null);
        Ok(match expected {
            Value::Array(options) => options.iter().any(|option| loose_eq(actual, option)),
            _ => loose_eq(actual, expected),
        })
    }

    fn condition_matches(&self, row: &Row, condition: &Condition) -> StoreResult<bool> {
        if condition.is_empty() {
            return Ok(true);
        }
        for (field, expected) in &condition.pairs {
            let matched = self.pair_matches(row, field, expected)?;
            match condition.junction {
                Junction::And if !matched => return Ok(false),
                Junction::Or if matched => return Ok(true),
                _ => {}
            }
        }
        Ok(condition.junction == Junction::And)
    }

    fn matching_rows(&self) -> StoreResult<Vec<Row>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let resources = self.resources.read().unwrap_or_else(PoisonError::into_inner);
        let resource = resources
            .get(&self.resource)
            .ok_or_else(|| StoreError::UnknownResource(self.resource.clone()))?;

        let mut rows = Vec::new();
        'rows: for row in &resource.rows {
            for condition in &self.conditions {
                if !self.condition_matches(row, condition)? {
                    continue 'rows;
                }
            }
            rows.push(row.clone());
        }
        Ok(rows)
    }
}

impl Query for MemoryQuery {
    fn resource(&self) -> &str {
        &self.resource
    }

    fn primary_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    fn and_where(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    fn exists(&self) -> StoreResult<bool> {
        Ok(!self.matching_rows()?.is_empty())
    }

    fn count_distinct(&self, field: &str) -> StoreResult<u64> {
        let column = self.column(field)?;
        let values: Vec<Value> = self
            .matching_rows()?
            .into_iter()
            .filter_map(|mut row| row.remove(column))
            .filter(|value| !value.is_null())
            .collect();
        Ok(distinct(&values).len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .table(
                "products",
                vec![
                    json!({"id": 1, "type_id": 10, "status": "active"}),
                    json!({"id": 2, "type_id": 10, "status": "hidden"}),
                    json!({"id": 3, "type_id": 20, "status": "active"}),
                ],
            )
            .collection("tags", vec![json!({"name": "rust"}), json!("not a row")])
    }

    #[test]
    fn relational_tables_expose_alias() {
        let store = store();
        let query = store.find("products").unwrap();
        assert_eq!(query.primary_alias(), Some("products"));

        let query = store.find("tags").unwrap();
        assert_eq!(query.primary_alias(), None);
    }

    #[test]
    fn unknown_resource_is_an_error() {
        assert!(matches!(
            store().find("missing"),
            Err(StoreError::UnknownResource(_))
        ));
    }

    #[test]
    fn exists_with_alias_qualified_fields() {
        let store = store();
        let mut query = store.find("products").unwrap();
        query.and_where(Condition::all([("products.id", json!("2"))]));
        assert!(query.exists().unwrap());

        let mut query = store.find("products").unwrap();
        query.and_where(Condition::all([("id", json!(9))]));
        assert!(!query.exists().unwrap());
    }

    #[test]
    fn or_junction_and_in_lists() {
        let store = store();
        let mut query = store.find("products").unwrap();
        query.and_where(
            Condition::new(Junction::Or)
                .push("id", json!(99))
                .push("status", json!("hidden")),
        );
        assert!(query.exists().unwrap());

        let mut query = store.find("products").unwrap();
        query.and_where(Condition::all([("id", json!([1, 3, 7]))]));
        assert_eq!(query.count_distinct("id").unwrap(), 2);
        assert_eq!(query.count_distinct("type_id").unwrap(), 2);
    }

    #[test]
    fn conditions_combine_by_conjunction() {
        let store = store();
        let mut query = store.find("products").unwrap();
        query.and_where(Condition::all([("type_id", json!(10))]));
        query.and_where(Condition::all([("status", json!("active"))]));
        assert_eq!(query.count_distinct("id").unwrap(), 1);
    }

    #[test]
    fn expressions_are_unsupported() {
        let store = store();
        let mut query = store.find("products").unwrap();
        query.and_where(Condition::all([("LOWER(status)", json!("active"))]));
        assert!(matches!(query.exists(), Err(StoreError::Unsupported(_))));
    }

    #[test]
    fn insert_and_count_queries() {
        let store = store();
        store.insert("tags", json!({"name": "serde"})).unwrap();
        assert!(store.insert("tags", json!(1)).is_err());

        let mut query = store.find("tags").unwrap();
        query.and_where(Condition::all([("name", json!("serde"))]));
        assert!(query.exists().unwrap());
        assert_eq!(store.executed_queries(), 1);
    }

    #[test]
    fn poisoned_lock_still_accepts_tables() {
        let store = store();
        let holder = store.clone();
        let panicked = std::thread::spawn(move || {
            let _guard = holder.resources.write().unwrap();
            panic!("writer died");
        })
        .join();
        assert!(panicked.is_err());
        assert!(store.resources.is_poisoned());

        let store = store.table("late", vec![json!({"id": 7})]);
        store.insert("late", json!({"id": 8})).unwrap();
        let mut query = store.find("late").unwrap();
        query.and_where(Condition::all([("id", json!([7, 8]))]));
        assert_eq!(query.count_distinct("id").unwrap(), 2);
    }
}
