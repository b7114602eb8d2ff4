//! HTTP server exposing list-model stores.
//!
//! Any [`StoreFactory`] can be served; [`crate::store::RestStore`] is the
//! matching client.
//!
//! # API Endpoints
//!
//! | Method | Path                        | Description                     |
//! |--------|-----------------------------|---------------------------------|
//! | GET    | `/health`                   | Health check                    |
//! | GET    | `/api/stores/{store}`       | Query a page (`page`, `pageSize`, `filter`) |
//! | POST   | `/api/stores/{store}`       | Create a record                 |
//! | GET    | `/api/stores/{store}/{id}`  | Fetch one record                |
//! | PATCH  | `/api/stores/{store}/{id}`  | Merge into a record             |
//! | GET    | `/api/logs`                 | SSE stream for real-time logs   |

use axum::{
    extract::{Path, Query, State},
    http::{header, Method},
    response::{sse::Event, Json, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::types::{body_record, parse_id, ApiError, ListQuery};
use crate::error::{ServerError, ServerResult};
use crate::events::logs::{log_info, LOG_BROADCASTER};
use crate::store::{Page, StoreFactory, StoreRef};

type Stores = Arc<dyn StoreFactory>;

/// Routes over `factory`, with permissive CORS.
pub fn router<F: StoreFactory + 'static>(factory: F) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let stores: Stores = Arc::new(factory);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/stores/{store}", get(query_page).post(create))
        .route("/api/stores/{store}/{id}", get(get_one).patch(update))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(stores)
}

/// Serve `factory` until the process stops.
pub async fn start_server<F: StoreFactory + 'static>(port: u16, factory: F) -> ServerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Restmigrator server running on http://localhost:{}", port);
    println!("   GET   /api/stores/{{store}}       - Query a page");
    println!("   POST  /api/stores/{{store}}       - Create a record");
    println!("   GET   /api/stores/{{store}}/{{id}}  - Fetch a record");
    println!("   PATCH /api/stores/{{store}}/{{id}}  - Merge into a record");
    println!("   GET   /api/logs                 - SSE log stream");
    println!("   GET   /health                   - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(factory)).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "restmigrator",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn query_page(
    State(stores): State<Stores>,
    Path(store): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page>, ApiError> {
    let filter = query.filter()?;
    let model = stores.open(&StoreRef::new(store)).map_err(ServerError::from)?;
    let page = model
        .query_page(query.page, query.page_size, &filter)
        .await
        .map_err(ServerError::from)?;
    Ok(Json(page))
}

async fn create(
    State(stores): State<Stores>,
    Path(store): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let record = body_record(body)?;
    let model = stores.open(&StoreRef::new(store.as_str())).map_err(ServerError::from)?;
    let created = model.upsert(record, None).await.map_err(ServerError::from)?;

    log_info(format!("Created record in '{}'", store));
    Ok(Json(created))
}

async fn get_one(
    State(stores): State<Stores>,
    Path((store, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let model = stores.open(&StoreRef::new(store)).map_err(ServerError::from)?;
    let record = model.get_one(&parse_id(&id)).await.map_err(ServerError::from)?;
    Ok(Json(record))
}

async fn update(
    State(stores): State<Stores>,
    Path((store, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let record = body_record(body)?;
    let model = stores.open(&StoreRef::new(store.as_str())).map_err(ServerError::from)?;
    let merged = model
        .upsert(record, Some(parse_id(&id)))
        .await
        .map_err(ServerError::from)?;

    log_info(format!("Updated record {} in '{}'", id, store));
    Ok(Json(merged))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
