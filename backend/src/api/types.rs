//! REST API types for the list-model endpoints.

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ServerError, StoreError};

/// Query string of `GET /api/stores/{store}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// 0-based page index
    #[serde(default)]
    pub page: usize,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Exact-match filter as a JSON object
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_page_size() -> usize {
    50
}

impl ListQuery {
    /// Parse the `filter` parameter.
    pub fn filter(&self) -> Result<Map<String, Value>, ServerError> {
        match self.filter.as_deref() {
            None | Some("") => Ok(Map::new()),
            Some(raw) => match serde_json::from_str(raw) {
                Ok(Value::Object(filter)) => Ok(filter),
                Ok(_) => Err(ServerError::BadRequest("filter must be a JSON object".into())),
                Err(e) => Err(ServerError::BadRequest(format!("invalid filter: {}", e))),
            },
        }
    }
}

/// Error reply: status and `{ "error": message }`
pub type ApiError = (StatusCode, Json<Value>);

/// Error body sent to clients
pub fn error_response(error: &str) -> Value {
    json!({ "error": error })
}

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        let status = match &err {
            ServerError::Store(StoreError::NotFound { .. } | StoreError::UnknownStore(_)) => {
                StatusCode::NOT_FOUND
            }
            ServerError::Store(StoreError::Rejected(_)) => StatusCode::CONFLICT,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match err {
            ServerError::Store(store) => store.to_string(),
            other => other.to_string(),
        };
        (status, Json(error_response(&message)))
    }
}

/// Path segment to id: integers stay integers.
pub fn parse_id(raw: &str) -> Value {
    raw.parse::<i64>().map(Value::from).unwrap_or_else(|_| Value::from(raw))
}

/// Request body as a record.
pub fn body_record(body: Value) -> Result<Map<String, Value>, ServerError> {
    match body {
        Value::Object(record) => Ok(record),
        _ => Err(ServerError::BadRequest("body must be a JSON object".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parsing() {
        let query = ListQuery { filter: Some(r#"{"email":"jo@x"}"#.into()), ..Default::default() };
        assert_eq!(query.filter().unwrap()["email"], "jo@x");

        let query = ListQuery { filter: Some("[1]".into()), ..Default::default() };
        assert!(matches!(query.filter(), Err(ServerError::BadRequest(_))));

        assert!(ListQuery::default().filter().unwrap().is_empty());
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42"), json!(42));
        assert_eq!(parse_id("abc"), json!("abc"));
    }

    #[test]
    fn test_error_status() {
        let (status, body) = ApiError::from(ServerError::Store(StoreError::UnknownStore("x".into())));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.0["error"], "Unknown store: x");

        let (status, _) = ApiError::from(ServerError::BadRequest("nope".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
