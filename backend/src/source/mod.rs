//! Source suppliers.
//!
//! A source is a lazy, forward-only stream of records. The engine receives
//! a [`SourceFactory`] and opens a fresh stream on every boot.

pub mod delimited;

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{SourceError, SourceResult};
use crate::store::ListModel;

pub use delimited::{parse_bytes_auto, parse_file_auto, parse_str, ParsedCsv};

/// Lazy sequence of source records
pub type RecordStream = BoxStream<'static, SourceResult<Value>>;

/// Opens a new record stream
pub type SourceFactory = Arc<dyn Fn() -> RecordStream + Send + Sync>;

/// Records held in memory
pub fn from_records(records: Vec<Value>) -> SourceFactory {
    Arc::new(move || stream::iter(records.clone().into_iter().map(Ok)).boxed())
}

/// Records of a CSV file, read when the stream is first polled
pub fn from_csv_path(path: impl Into<PathBuf>) -> SourceFactory {
    let path = path.into();
    Arc::new(move || {
        let path = path.clone();
        stream::once(async move { parse_file_auto(&path) })
            .map(|parsed| match parsed {
                Ok(parsed) => stream::iter(parsed.records.into_iter().map(Ok)).boxed(),
                Err(err) => stream::iter(vec![Err(err)]).boxed(),
            })
            .flatten()
            .boxed()
    })
}

/// Every record of a list-model store, fetched page by page.
///
/// Stops on a short page or once `total_count` records were read.
pub fn from_store(store: Arc<dyn ListModel>, page_size: usize) -> SourceFactory {
    let page_size = page_size.max(1);
    Arc::new(move || walk_store(store.clone(), page_size))
}

struct Walk {
    store: Arc<dyn ListModel>,
    page: usize,
    seen: usize,
    done: bool,
}

fn walk_store(store: Arc<dyn ListModel>, page_size: usize) -> RecordStream {
    let start = Walk { store, page: 0, seen: 0, done: false };
    stream::unfold(start, move |mut walk| async move {
        if walk.done {
            return None;
        }
        let items: Vec<SourceResult<Value>> =
            match walk.store.query_page(walk.page, page_size, &Map::new()).await {
                Ok(page) => {
                    walk.page += 1;
                    walk.seen += page.page_data.len();
                    walk.done = page.page_data.len() < page_size || walk.seen >= page.total_count;
                    page.page_data.into_iter().map(Ok).collect()
                }
                Err(err) => {
                    walk.done = true;
                    vec![Err(SourceError::from(err))]
                }
            };
        Some((stream::iter(items), walk))
    })
    .flatten()
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use futures::TryStreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_from_records_restarts() {
        let source = from_records(vec![json!({ "a": 1 }), json!({ "a": 2 })]);
        let first: Vec<Value> = source().try_collect().await.unwrap();
        let second: Vec<Value> = source().try_collect().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[tokio::test]
    async fn test_from_csv_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.csv");
        std::fs::write(&path, "title,author\nA,Jo\nC,Al\n").unwrap();

        let records: Vec<Value> = from_csv_path(&path)().try_collect().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["author"], "Al");
    }

    #[tokio::test]
    async fn test_missing_csv_is_stream_error() {
        let result: SourceResult<Vec<Value>> =
            from_csv_path("/nonexistent/file.csv")().try_collect().await;
        assert!(matches!(result, Err(SourceError::Io(_))));
    }

    #[tokio::test]
    async fn test_walk_store_pages() {
        let store = MemoryStore::new("legacy", "id")
            .seed((0..5).map(|i| json!({ "n": i })));
        let records: Vec<Value> = from_store(Arc::new(store), 2)().try_collect().await.unwrap();

        let ns: Vec<i64> = records.iter().map(|r| r["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_walk_empty_store() {
        let store = MemoryStore::new("legacy", "id");
        let records: Vec<Value> = from_store(Arc::new(store), 3)().try_collect().await.unwrap();
        assert!(records.is_empty());
    }
}
