//! Product listing handler.

use axum::Json;
use axum::extract::State;

use crate::api::dto::ProductDto;
use crate::app_state::AppState;
use crate::error::ShopwatchError;

/// `GET /products`: every ledger row, ordered by shop, name, and link.
///
/// # Errors
///
/// Returns [`ShopwatchError::PersistenceError`] if the store query fails.
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductDto>>, ShopwatchError> {
    let rows = state.store.list_all().await?;
    tracing::debug!(rows = rows.len(), "serving products");
    Ok(Json(rows.into_iter().map(ProductDto::from).collect()))
}
