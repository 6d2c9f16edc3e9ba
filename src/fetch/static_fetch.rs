//! Single-request HTTP fetch for server-rendered catalogs.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::Fetch;
use crate::error::FetchError;

/// Fetches a page with one GET. Any transport error or non-success status
/// fails the URL; there is no retry at this layer.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: reqwest::Client,
}

impl StaticFetcher {
    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Builds the shared HTTP client used by every static shop.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the TLS backend cannot be
    /// initialized.
    pub fn build_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Fetch for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(transport)
    }
}
