//! REST API layer: read-only access to the product ledger.
//!
//! `GET /products` requires the `X-API-KEY` header. `GET /health` is
//! open. CORS allows `GET` and `OPTIONS` from any origin with the
//! `Content-Type` and `X-API-KEY` headers, and preflight requests are
//! answered before the key check runs.

pub mod auth;
pub mod dto;
pub mod handlers;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method};
use axum::middleware;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Builds the complete API router with state applied.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/products", get(handlers::list_products))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .merge(protected)
        .route("/health", get(handlers::health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(auth::API_KEY_HEADER)])
}
