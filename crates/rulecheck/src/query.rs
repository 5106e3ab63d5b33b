//! The narrow store interface existence checks are evaluated through.
//!
//! Rules never talk to a concrete database. They build a [`Condition`],
//! obtain a [`Query`] from a [`DataStore`], refine it with an optional
//! [`Filter`] and ask one question: does a match exist, or how many distinct
//! values match.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// How the pairs of a [`Condition`] are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Junction {
    #[default]
    And,
    Or,
}

/// A set of `(field, value)` pairs joined by one [`Junction`].
///
/// A list value means "field is one of these values".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub junction: Junction,
    pub pairs: Vec<(String, Value)>,
}

impl Condition {
    pub fn new(junction: Junction) -> Self {
        Self {
            junction,
            pairs: Vec::new(),
        }
    }

    /// Conjunction of the given pairs.
    pub fn all<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            junction: Junction::And,
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn push(mut self, field: impl Into<String>, value: Value) -> Self {
        self.pairs.push((field.into(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(field, _)| field.as_str())
    }
}

/// A query against one resource of the store.
pub trait Query: Send {
    /// The resource (table, collection) this query reads.
    fn resource(&self) -> &str;

    /// Alias of the primary resource for relational stores, `None` when the
    /// resource cannot be joined and field names need no qualification.
    fn primary_alias(&self) -> Option<&str>;

    /// Add a condition, combined with the existing ones by conjunction.
    fn and_where(&mut self, condition: Condition);

    /// Whether at least one record matches.
    fn exists(&self) -> StoreResult<bool>;

    /// Number of distinct values of `field` among matching records.
    fn count_distinct(&self, field: &str) -> StoreResult<u64>;
}

/// Executes a callback pinned to the primary replica.
pub trait PrimaryRouting: Send + Sync {
    fn use_primary(&self, run: &mut dyn FnMut() -> StoreResult<()>) -> StoreResult<()>;
}

/// A handle on a data store.
pub trait DataStore: Send + Sync {
    /// Start a query over a resource.
    fn find(&self, resource: &str) -> StoreResult<Box<dyn Query>>;

    /// Primary-replica routing, when the store supports it.
    fn primary(&self) -> Option<&dyn PrimaryRouting> {
        None
    }
}

/// Run `op` once, inside the store's primary routing when requested and
/// available, or directly otherwise.
pub fn execute<T>(
    store: &dyn DataStore,
    force_primary: bool,
    op: impl FnOnce() -> StoreResult<T>,
) -> StoreResult<T> {
    let routing = match store.primary() {
        Some(routing) if force_primary => routing,
        _ => {
            tracing::trace!(force_primary, "executing query with default routing");
            return op();
        }
    };

    tracing::trace!("executing query on primary replica");
    let mut op = Some(op);
    let mut output = None;
    routing.use_primary(&mut || {
        if let Some(op) = op.take() {
            output = Some(op()?);
        }
        Ok(())
    })?;

    output.ok_or_else(|| StoreError::Backend("primary routing did not run the query".into()))
}

type FilterFn = dyn Fn(&mut dyn Query) + Send + Sync;

/// Extra restriction applied to the query after the base condition.
#[derive(Clone)]
pub enum Filter {
    /// A partial condition merged by conjunction.
    Where(Condition),
    /// A callback free to refine the query.
    Callback(Arc<FilterFn>),
}

impl Filter {
    pub fn callback(f: impl Fn(&mut dyn Query) + Send + Sync + 'static) -> Self {
        Filter::Callback(Arc::new(f))
    }

    /// Refine `query`. Never removes the conditions already on it.
    pub fn apply(&self, query: &mut dyn Query) {
        match self {
            Filter::Where(condition) => query.and_where(condition.clone()),
            Filter::Callback(f) => f(query),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Where(condition) => f.debug_tuple("Where").field(condition).finish(),
            Filter::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl From<Condition> for Filter {
    fn from(condition: Condition) -> Self {
        Filter::Where(condition)
    }
}
