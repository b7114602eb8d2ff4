//! Relation persister: writes a sub-record through its own store.

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::store::{StoreFactory, StoreRef};

/// A related record that was written.
#[derive(Debug, Clone)]
pub struct Linked {
    /// Full record returned by the related store
    pub persisted: Value,
    /// Its index-field value, to substitute into the parent patch
    pub foreign_key: Value,
}

/// Open a fresh instance of `store` and create `value` in it.
pub async fn persist(stores: &dyn StoreFactory, store: &StoreRef, value: Value) -> StoreResult<Linked> {
    let record = match value {
        Value::Object(record) => record,
        other => {
            return Err(StoreError::Rejected(format!(
                "related value for '{}' must be an object, got {}",
                store, other
            )))
        }
    };

    let related = stores.open(store)?;
    let persisted = related.upsert(record, None).await?;
    let foreign_key = persisted
        .get(related.index_key())
        .filter(|key| !key.is_null())
        .cloned()
        .ok_or_else(|| StoreError::MissingIndex {
            store: store.to_string(),
            key: related.index_key().to_string(),
        })?;

    Ok(Linked { persisted, foreign_key })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryFactory, MemoryStore};
    use serde_json::json;

    #[tokio::test]
    async fn test_persist_returns_foreign_key() {
        let factory = MemoryFactory::strict().with_store(MemoryStore::new("users", "id"));
        let linked = persist(&factory, &"users".into(), json!({ "name": "Jo" }))
            .await
            .unwrap();

        assert_eq!(linked.foreign_key, json!(1));
        assert_eq!(linked.persisted["name"], "Jo");
    }

    #[tokio::test]
    async fn test_scalar_value_rejected_without_write() {
        let users = MemoryStore::new("users", "id");
        let factory = MemoryFactory::strict().with_store(users.clone());

        let result = persist(&factory, &"users".into(), json!("Jo")).await;
        assert!(matches!(result, Err(StoreError::Rejected(_))));
        assert_eq!(users.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_store() {
        let result = persist(&MemoryFactory::strict(), &"users".into(), json!({})).await;
        assert!(matches!(result, Err(StoreError::UnknownStore(_))));
    }
}
