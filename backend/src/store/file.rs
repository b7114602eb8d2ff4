//! Flat-file list-model store.
//!
//! Each store is one pretty-printed JSON file `<dir>/<name>.json`. The file
//! is re-read on every operation so separate handles (and separate runs)
//! see each other's writes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{id_text, matches_filter, paginate, ListModel, Page, StoreFactory, StoreRef};
use crate::error::{StoreError, StoreResult};

/// Default directory for file stores (relative to current dir)
pub const DEFAULT_STORE_DIR: &str = ".restmigrator/stores";

/// On-disk layout of one store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTable {
    index_key: String,
    next_id: i64,
    updated_at: Option<String>,
    records: Vec<Value>,
}

/// A store persisted as a single JSON file
#[derive(Debug, Clone)]
pub struct FileStore {
    name: String,
    path: PathBuf,
    index_key: String,
    /// Serializes read-modify-write cycles between handles of one factory
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Open (or lazily create) the store `name` inside `dir`
    pub fn open(dir: impl AsRef<Path>, name: &str, index_key: &str) -> Self {
        Self::with_lock(dir.as_ref(), name, index_key, Arc::new(Mutex::new(())))
    }

    fn with_lock(dir: &Path, name: &str, index_key: &str, lock: Arc<Mutex<()>>) -> Self {
        Self {
            name: name.to_string(),
            path: dir.join(format!("{}.json", file_stem(name))),
            index_key: index_key.to_string(),
            lock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<StoredTable> {
        if !self.path.exists() {
            return Ok(StoredTable {
                index_key: self.index_key.clone(),
                next_id: 0,
                updated_at: None,
                records: Vec::new(),
            });
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, table: &mut StoredTable) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        table.updated_at = Some(chrono::Utc::now().to_rfc3339());
        let content = serde_json::to_string_pretty(table)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn position(&self, table: &StoredTable, id: &Value) -> Option<usize> {
        table
            .records
            .iter()
            .position(|r| r.get(&self.index_key) == Some(id))
    }

    fn not_found(&self, id: &Value) -> StoreError {
        StoreError::NotFound {
            store: self.name.clone(),
            id: id_text(id),
        }
    }
}

#[async_trait]
impl ListModel for FileStore {
    fn index_key(&self) -> &str {
        &self.index_key
    }

    async fn upsert(&self, mut record: Map<String, Value>, id: Option<Value>) -> StoreResult<Value> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut table = self.load()?;

        let persisted = match id {
            Some(id) => {
                let pos = self.position(&table, &id).ok_or_else(|| self.not_found(&id))?;
                let existing = &mut table.records[pos];
                if let Value::Object(obj) = existing {
                    record.remove(&self.index_key);
                    obj.extend(record);
                }
                existing.clone()
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
                created
            }
        };

        self.save(&mut table)?;
        Ok(persisted)
    }

    async fn query_page(
        &self,
        page: usize,
        page_size: usize,
        filter: &Map<String, Value>,
    ) -> StoreResult<Page> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let table = self.load()?;
        let matching: Vec<Value> = table
            .records
            .into_iter()
            .filter(|r| matches_filter(r, filter))
            .collect();
        Ok(paginate(matching, page, page_size))
    }

    async fn get_one(&self, id: &Value) -> StoreResult<Value> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let table = self.load()?;
        self.position(&table, id)
            .map(|pos| table.records[pos].clone())
            .ok_or_else(|| self.not_found(id))
    }
}

/// Factory opening file stores inside one directory
#[derive(Debug, Clone)]
pub struct FileFactory {
    dir: PathBuf,
    index_key: String,
    lock: Arc<Mutex<()>>,
}

impl FileFactory {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            index_key: "id".to_string(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Set the index key used by every store of this factory
    pub fn with_index_key(mut self, key: &str) -> Self {
        self.index_key = key.to_string();
        self
    }
}

impl StoreFactory for FileFactory {
    fn open(&self, store: &StoreRef) -> StoreResult<Arc<dyn ListModel>> {
        if file_stem(store.name()).is_empty() {
            return Err(StoreError::UnknownStore(store.to_string()));
        }
        Ok(Arc::new(FileStore::with_lock(
            &self.dir,
            store.name(),
            &self.index_key,
            self.lock.clone(),
        )))
    }
}

/// File-system safe form of a store name
fn file_stem(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_writes_survive_reopen() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), "users", "id");
        let created = store.upsert(obj(json!({ "name": "Jo" })), None).await.unwrap();
        assert_eq!(created["id"], 1);

        let reopened = FileStore::open(dir.path(), "users", "id");
        assert_eq!(reopened.get_one(&json!(1)).await.unwrap()["name"], "Jo");
        let next = reopened.upsert(obj(json!({ "name": "Al" })), None).await.unwrap();
        assert_eq!(next["id"], 2);
    }

    #[tokio::test]
    async fn test_explicit_id_never_reused() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), "users", "id");
        store.upsert(obj(json!({ "id": 2, "name": "Jo" })), None).await.unwrap();
        let a = store.upsert(obj(json!({ "name": "Al" })), None).await.unwrap();

        let reopened = FileStore::open(dir.path(), "users", "id");
        let b = reopened.upsert(obj(json!({ "name": "Ed" })), None).await.unwrap();

        assert_eq!(a["id"], 3);
        assert_eq!(b["id"], 4);
        let page = reopened.query_page(0, 10, &obj(json!({ "id": 2 }))).await.unwrap();
        assert_eq!(page.total_count, 1);
    }

    #[tokio::test]
    async fn test_auto_id_skips_taken_values() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), "users", "id");
        std::fs::write(
            store.path(),
            r#"{ "indexKey": "id", "nextId": 0, "updatedAt": null, "records": [{ "id": 1 }] }"#,
        )
        .unwrap();

        let created = store.upsert(Map::new(), None).await.unwrap();
        assert_eq!(created["id"], 2);
    }

    #[tokio::test]
    async fn test_update_merge_and_query() {
        let dir = tempdir().unwrap();
        let factory = FileFactory::new(dir.path());
        let store = factory.open(&"Blog Posts".into()).unwrap();

        store.upsert(obj(json!({ "slug": "a" })), None).await.unwrap();
        store.upsert(obj(json!({ "title": "A" })), Some(json!(1))).await.unwrap();

        let page = store.query_page(0, 10, &obj(json!({ "slug": "a" }))).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.page_data[0]["title"], "A");
        assert!(dir.path().join("blog-posts.json").exists());
    }

    #[tokio::test]
    async fn test_missing_record() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), "users", "id");
        assert!(matches!(
            store.get_one(&json!(3)).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Blog Posts!"), "blog-posts");
        assert_eq!(file_stem("user_accounts"), "user_accounts");
        assert_eq!(file_stem("../"), "");
    }
}
