//! Uniqueness guard against the primary store.

use serde_json::{Map, Value};

use crate::error::{Duplicate, MigrateError, Rejection};
use crate::store::ListModel;

/// Fail with [`Rejection::Duplicate`] when `store` already holds `field == value`.
///
/// A failing lookup is a [`Rejection::Failure`], never a skip.
pub async fn check_unique(store: &dyn ListModel, field: &str, value: &Value) -> Result<(), Rejection> {
    let mut filter = Map::new();
    filter.insert(field.to_string(), value.clone());

    let page = store
        .query_page(0, 1, &filter)
        .await
        .map_err(|source| MigrateError::Lookup { field: field.to_string(), source })?;

    if page.page_data.is_empty() && page.total_count == 0 {
        Ok(())
    } else {
        Err(Duplicate { field: field.to_string(), value: value.clone() }.into())
    }
}
