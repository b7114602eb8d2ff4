//! REST list-model client.
//!
//! Talks to any backend exposing the list-model API served by
//! [`crate::api::server`]:
//!
//! | Method | Path                        | Use                    |
//! |--------|-----------------------------|------------------------|
//! | GET    | `/api/stores/{store}`       | `query_page`           |
//! | POST   | `/api/stores/{store}`       | `upsert` (create)      |
//! | GET    | `/api/stores/{store}/{id}`  | `get_one`              |
//! | PATCH  | `/api/stores/{store}/{id}`  | `upsert` (merge)       |

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{id_text, ListModel, Page, StoreFactory, StoreRef};
use crate::error::{StoreError, StoreResult};

/// HTTP-backed store
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    name: String,
    index_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, name: &str) -> Self {
        Self::with_client(Client::new(), base_url, name)
    }

    pub fn with_client(client: Client, base_url: &str, name: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            name: name.to_string(),
            index_key: "id".to_string(),
        }
    }

    /// Set the index key (default `id`)
    pub fn with_index_key(mut self, key: &str) -> Self {
        self.index_key = key.to_string();
        self
    }

    /// `{base}/api/stores/{name}[/{id}]`, each segment percent-encoded
    fn url(&self, id: Option<&Value>) -> StoreResult<Url> {
        let invalid = |message: String| StoreError::InvalidUrl {
            url: self.base_url.clone(),
            message,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| invalid("cannot hold a path".into()))?;
            segments.pop_if_empty().extend(["api", "stores", self.name.as_str()]);
            if let Some(id) = id {
                segments.push(&id_text(id));
            }
        }
        Ok(url)
    }

    /// Turn non-success statuses into `StoreError`s
    async fn check(&self, response: Response, id: Option<&Value>) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(StoreError::NotFound {
                    store: self.name.clone(),
                    id: id_text(id),
                });
            }
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
            .to_string();
        Err(StoreError::Status { status: status.as_u16(), message })
    }
}

#[async_trait]
impl ListModel for RestStore {
    fn index_key(&self) -> &str {
        &self.index_key
    }

    async fn upsert(&self, record: Map<String, Value>, id: Option<Value>) -> StoreResult<Value> {
        let response = match id {
            Some(ref id) => self.client.patch(self.url(Some(id))?).json(&record).send().await?,
            None => self.client.post(self.url(None)?).json(&record).send().await?,
        };
        let response = self.check(response, id.as_ref()).await?;
        Ok(response.json().await?)
    }

    async fn query_page(
        &self,
        page: usize,
        page_size: usize,
        filter: &Map<String, Value>,
    ) -> StoreResult<Page> {
        let mut query = vec![
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        if !filter.is_empty() {
            query.push(("filter", serde_json::to_string(filter)?));
        }

        let response = self.client.get(self.url(None)?).query(&query).send().await?;
        let response = self.check(response, None).await?;
        Ok(response.json().await?)
    }

    async fn get_one(&self, id: &Value) -> StoreResult<Value> {
        let response = self.client.get(self.url(Some(id))?).send().await?;
        let response = self.check(response, Some(id)).await?;
        Ok(response.json().await?)
    }
}

/// Factory opening REST stores on one backend, sharing a connection pool
#[derive(Debug, Clone)]
pub struct RestFactory {
    client: Client,
    base_url: String,
    index_key: String,
}

impl RestFactory {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            index_key: "id".to_string(),
        }
    }

    /// Set the index key used by every store of this factory
    pub fn with_index_key(mut self, key: &str) -> Self {
        self.index_key = key.to_string();
        self
    }
}

impl StoreFactory for RestFactory {
    fn open(&self, store: &StoreRef) -> StoreResult<Arc<dyn ListModel>> {
        Ok(Arc::new(
            RestStore::with_client(self.client.clone(), &self.base_url, store.name())
                .with_index_key(&self.index_key),
        ))
    }
}
