//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::persistence::ProductStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Ledger queried by the listing endpoint.
    pub store: Arc<dyn ProductStore>,
    /// Key every protected request must present in `X-API-KEY`.
    pub api_key: Arc<str>,
}

impl AppState {
    /// Creates a new `AppState`.
    #[must_use]
    pub fn new(store: Arc<dyn ProductStore>, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            api_key: api_key.into(),
        }
    }
}
