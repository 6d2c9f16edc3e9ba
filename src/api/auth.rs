//! API key check for protected routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::app_state::AppState;
use crate::error::ShopwatchError;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejects requests whose `X-API-KEY` header does not match the
/// configured key.
///
/// # Errors
///
/// Returns [`ShopwatchError::Unauthorized`] for a missing or wrong key.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ShopwatchError> {
    let authorized = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| !state.api_key.is_empty() && key == &*state.api_key);

    if authorized {
        Ok(next.run(request).await)
    } else {
        tracing::debug!(path = %request.uri().path(), "rejected request without valid api key");
        Err(ShopwatchError::Unauthorized)
    }
}
