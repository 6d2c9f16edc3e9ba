//! Page retrieval strategies.
//!
//! Every shop is fetched through a [`Fetch`] implementation chosen from its
//! configured [`ShopKind`]: a plain HTTP GET for static catalogs, or a
//! headless render with bounded retries for script-driven ones.

pub mod rendered;
pub mod static_fetch;

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

pub use rendered::{ChromiumRenderer, PageRenderer, RenderedFetcher};
pub use static_fetch::StaticFetcher;

use crate::config::{RenderSettings, ShopConfig, ShopKind};
use crate::error::FetchError;

/// Retrieves the raw document for a URL.
///
/// Implementations hold no per-call state; retries happen inside a
/// single call.
#[async_trait]
pub trait Fetch: Send + Sync + std::fmt::Debug {
    /// Fetches `url` and returns its document text.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] once the strategy gives up on the URL.
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Builds the fetch strategy for a shop.
///
/// Static shops share the given HTTP client; rendered shops get their own
/// fetcher carrying the shop's retry marker.
#[must_use]
pub fn fetcher_for(
    shop: &ShopConfig,
    client: &reqwest::Client,
    render: RenderSettings,
) -> Arc<dyn Fetch> {
    match shop.kind {
        ShopKind::Static => Arc::new(StaticFetcher::new(client.clone())),
        ShopKind::Rendered => Arc::new(RenderedFetcher::new(
            ChromiumRenderer::default(),
            render,
            shop.retry_marker.clone(),
        )),
    }
}
