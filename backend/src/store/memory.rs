//! In-memory list-model store.
//!
//! Every handle cloned from a [`MemoryStore`] shares the same table, so the
//! factory can hand out fresh instances while data stays put.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{id_text, matches_filter, paginate, ListModel, Page, StoreFactory, StoreRef};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    records: Vec<Value>,
    upserts: usize,
}

/// Handle to a shared in-memory table with integer auto-increment ids.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    name: String,
    index_key: String,
    table: Arc<Mutex<Table>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>, index_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index_key: index_key.into(),
            table: Arc::new(Mutex::new(Table::default())),
        }
    }

    /// Insert records directly, without counting them as upserts.
    pub fn seed(self, records: impl IntoIterator<Item = Value>) -> Self {
        {
            let mut table = self.lock();
            for record in records {
                let mut obj = match record {
                    Value::Object(obj) => obj,
                    _ => continue,
                };
                let id = match obj.get(&self.index_key) {
                    Some(Value::Number(n)) => {
                        let n = n.as_i64().unwrap_or(table.next_id + 1);
                        table.next_id = table.next_id.max(n);
                        Value::from(n)
                    }
                    Some(other) if !other.is_null() => other.clone(),
                    _ => {
                        table.next_id += 1;
                        Value::from(table.next_id)
                    }
                };
                obj.insert(self.index_key.clone(), id);
                table.records.push(Value::Object(obj));
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of `upsert` calls made through any handle.
    pub fn upsert_calls(&self) -> usize {
        self.lock().upserts
    }

    pub fn records(&self) -> Vec<Value> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn position(&self, table: &Table, id: &Value) -> Option<usize> {
        table
            .records
            .iter()
            .position(|r| r.get(&self.index_key) == Some(id))
    }
}

#[async_trait]
impl ListModel for MemoryStore {
    fn index_key(&self) -> &str {
        &self.index_key
    }

    async fn upsert(&self, mut record: Map<String, Value>, id: Option<Value>) -> StoreResult<Value> {
        let mut table = self.lock();
        table.upserts += 1;

        match id {
            Some(id) => {
                let pos = self.position(&table, &id).ok_or_else(|| StoreError::NotFound {
                    store: self.name.clone(),
                    id: id_text(&id),
                })?;
                let existing = &mut table.records[pos];
                if let Value::Object(obj) = existing {
                    record.remove(&self.index_key);
                    obj.extend(record);
                }
                Ok(existing.clone())
            }
            None => {
                let id = match record.get(&self.index_key) {
                    Some(id) if !id.is_null() => {
                        if self.position(&table, id).is_some() {
                            return Err(StoreError::Rejected(format!(
                                "{} '{}' already exists in '{}'",
                                self.index_key,
                                id_text(id),
                                self.name
                            )));
                        }
                        if let Some(n) = id.as_i64() {
                            table.next_id = table.next_id.max(n);
                        }
                        id.clone()
                    }
                    _ => loop {
                        table.next_id += 1;
                        let candidate = Value::from(table.next_id);
                        if self.position(&table, &candidate).is_none() {
                            break candidate;
                        }
                    },
                };
                record.insert(self.index_key.clone(), id);
                let created = Value::Object(record);
                table.records.push(created.clone());
                Ok(created)
            }
        }
    }

    async fn query_page(
        &self,
        page: usize,
        page_size: usize,
        filter: &Map<String, Value>,
    ) -> StoreResult<Page> {
        let table = self.lock();
        let matching: Vec<Value> = table
            .records
            .iter()
            .filter(|r| matches_filter(r, filter))
            .cloned()
            .collect();
        Ok(paginate(matching, page, page_size))
    }

    async fn get_one(&self, id: &Value) -> StoreResult<Value> {
        let table = self.lock();
        self.position(&table, id)
            .map(|pos| table.records[pos].clone())
            .ok_or_else(|| StoreError::NotFound {
                store: self.name.clone(),
                id: id_text(id),
            })
    }
}

/// Factory over named in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryFactory {
    stores: Arc<Mutex<HashMap<String, MemoryStore>>>,
    strict: bool,
}

impl MemoryFactory {
    /// Factory that creates unknown stores on first use (index key `id`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory that only opens registered stores.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Register a store under its own name.
    pub fn with_store(self, store: MemoryStore) -> Self {
        self.lock().insert(store.name.clone(), store);
        self
    }

    /// Handle to a registered store, if any.
    pub fn store(&self, name: &str) -> Option<MemoryStore> {
        self.lock().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemoryStore>> {
        self.stores.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StoreFactory for MemoryFactory {
    fn open(&self, store: &StoreRef) -> StoreResult<Arc<dyn ListModel>> {
        let mut stores = self.lock();
        if self.strict && !stores.contains_key(store.name()) {
            return Err(StoreError::UnknownStore(store.to_string()));
        }
        let handle = stores
            .entry(store.name().to_string())
            .or_insert_with(|| MemoryStore::new(store.name(), "id"))
            .clone();
        Ok(Arc::new(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = MemoryStore::new("users", "id");
        let a = store.upsert(obj(json!({ "name": "Jo" })), None).await.unwrap();
        let b = store.upsert(obj(json!({ "name": "Al" })), None).await.unwrap();

        assert_eq!(a["id"], 1);
        assert_eq!(b["id"], 2);
        assert_eq!(store.upsert_calls(), 2);
    }

    #[tokio::test]
    async fn test_explicit_id_never_reused() {
        let store = MemoryStore::new("users", "id");
        store.upsert(obj(json!({ "id": 2, "name": "Jo" })), None).await.unwrap();
        let a = store.upsert(obj(json!({ "name": "Al" })), None).await.unwrap();
        let b = store.upsert(obj(json!({ "name": "Ed" })), None).await.unwrap();

        assert_eq!(a["id"], 3);
        assert_eq!(b["id"], 4);
        let page = store.query_page(0, 10, &obj(json!({ "id": 2 }))).await.unwrap();
        assert_eq!(page.total_count, 1);
    }

    #[tokio::test]
    async fn test_update_merges() {
        let store = MemoryStore::new("users", "id").seed(vec![json!({ "id": 5, "name": "Jo" })]);
        let updated = store
            .upsert(obj(json!({ "email": "jo@x" })), Some(json!(5)))
            .await
            .unwrap();

        assert_eq!(updated, json!({ "id": 5, "name": "Jo", "email": "jo@x" }));
        assert_eq!(store.get_one(&json!(5)).await.unwrap()["email"], "jo@x");
    }

    #[tokio::test]
    async fn test_seed_advances_counter() {
        let store = MemoryStore::new("users", "id").seed(vec![json!({ "id": 9 })]);
        let created = store.upsert(Map::new(), None).await.unwrap();
        assert_eq!(created["id"], 10);
        assert_eq!(store.upsert_calls(), 1);
    }

    #[tokio::test]
    async fn test_get_one_not_found() {
        let store = MemoryStore::new("users", "id");
        assert!(matches!(
            store.get_one(&json!(1)).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.upsert(Map::new(), Some(json!(1))).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_page_filters() {
        let store = MemoryStore::new("users", "id").seed(vec![
            json!({ "email": "a@x" }),
            json!({ "email": "b@x" }),
            json!({ "email": "a@x" }),
        ]);
        let filter = obj(json!({ "email": "a@x" }));

        let page = store.query_page(0, 1, &filter).await.unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.page_data.len(), 1);
        assert_eq!(page.page_data[0]["id"], 1);
    }

    #[tokio::test]
    async fn test_factory_handles_share_data() {
        let factory = MemoryFactory::new();
        let first = factory.open(&"users".into()).unwrap();
        first.upsert(obj(json!({ "name": "Jo" })), None).await.unwrap();

        let second = factory.open(&"users".into()).unwrap();
        let page = second.query_page(0, 10, &Map::new()).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(factory.store("users").unwrap().upsert_calls(), 1);
    }

    #[test]
    fn test_strict_factory_rejects_unknown() {
        let factory = MemoryFactory::strict().with_store(MemoryStore::new("users", "id"));
        assert!(factory.open(&"users".into()).is_ok());
        assert!(matches!(
            factory.open(&"posts".into()),
            Err(StoreError::UnknownStore(_))
        ));
    }
}
