//! List-model stores: the persistence seam of the engine.
//!
//! The engine only needs four operations from a store (see [`ListModel`]).
//! Stores are opened by name through a [`StoreFactory`], which returns a
//! fresh handle on every call.
//!
//! - [`memory`] - In-process tables, shared between handles
//! - [`file`] - One JSON file per store
//! - [`rest`] - HTTP client for the REST list-model API

pub mod file;
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::StoreResult;

pub use file::{FileFactory, FileStore};
pub use memory::{MemoryFactory, MemoryStore};
pub use rest::{RestFactory, RestStore};

/// Name of a store definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreRef(String);

impl StoreRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for StoreRef {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// One page of a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_data: Vec<Value>,
    pub total_count: usize,
}

/// A paginated, keyed record collection.
#[async_trait]
pub trait ListModel: Send + Sync {
    /// Field that uniquely identifies a record.
    fn index_key(&self) -> &str;

    /// Create when `id` is `None`, update-merge otherwise.
    /// Returns the full persisted record, index field included.
    async fn upsert(&self, record: Map<String, Value>, id: Option<Value>) -> StoreResult<Value>;

    /// Records matching every `filter` entry exactly. `page` is 0-based.
    async fn query_page(
        &self,
        page: usize,
        page_size: usize,
        filter: &Map<String, Value>,
    ) -> StoreResult<Page>;

    /// Fails with `StoreError::NotFound` when absent.
    async fn get_one(&self, id: &Value) -> StoreResult<Value>;
}

/// Opens store instances by name.
pub trait StoreFactory: Send + Sync {
    fn open(&self, store: &StoreRef) -> StoreResult<Arc<dyn ListModel>>;
}

/// True when `record` holds every `filter` entry.
pub(crate) fn matches_filter(record: &Value, filter: &Map<String, Value>) -> bool {
    filter
        .iter()
        .all(|(field, expected)| record.get(field) == Some(expected))
}

/// Stable text form of an id, used for paths and messages.
pub(crate) fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Slice one page out of an already-filtered list.
pub(crate) fn paginate(matching: Vec<Value>, page: usize, page_size: usize) -> Page {
    let total_count = matching.len();
    let page_data = matching
        .into_iter()
        .skip(page.saturating_mul(page_size))
        .take(page_size)
        .collect();
    Page { page_data, total_count }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matches_filter_exact() {
        let record = json!({ "email": "jo@x", "age": 30 });
        let mut filter = Map::new();
        filter.insert("email".into(), json!("jo@x"));
        assert!(matches_filter(&record, &filter));

        filter.insert("age".into(), json!("30"));
        assert!(!matches_filter(&record, &filter));
    }

    #[test]
    fn test_paginate() {
        let items: Vec<Value> = (1..=5).map(|i| json!(i)).collect();
        let page = paginate(items, 1, 2);
        assert_eq!(page.page_data, vec![json!(3), json!(4)]);
        assert_eq!(page.total_count, 5);
    }

    #[test]
    fn test_id_text() {
        assert_eq!(id_text(&json!(7)), "7");
        assert_eq!(id_text(&json!("abc")), "abc");
    }
}
