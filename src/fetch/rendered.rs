//! Headless-browser fetch for catalogs that build their listings in script.
//!
//! Each fetcher owns one Chromium instance, launched on first use with a
//! private profile directory. Every attempt opens a fresh tab bounded by a
//! timeout, waits a settle delay, and captures the document. Timeouts and
//! captures that still contain the shop's retry marker are retried until
//! the attempt cap; any other browser failure ends the fetch at once.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use url::Url;

use super::Fetch;
use crate::config::RenderSettings;
use crate::error::FetchError;

/// Produces the fully rendered document for a URL.
#[async_trait]
pub trait PageRenderer: Send + Sync + fmt::Debug {
    /// Loads `url`, waits `settle` for dynamic content, and returns the
    /// document's outer HTML.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Browser`] if the render fails.
    async fn render(&self, url: &Url, settle: Duration) -> Result<String, FetchError>;
}

static PROFILE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Chromium profile directory owned by one renderer, removed on drop.
#[derive(Debug)]
struct ProfileDir(PathBuf);

impl ProfileDir {
    fn unique() -> Self {
        let seq = PROFILE_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(std::env::temp_dir().join(format!(
            "shopwatch-chromium-{}-{seq}",
            std::process::id()
        )))
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// A running browser and the task pumping its CDP events.
struct BrowserSession {
    browser: Browser,
    events: JoinHandle<()>,
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.events.abort();
    }
}

/// Closes a tab when the render that opened it ends, including when the
/// render is cancelled by the attempt timeout.
struct TabGuard(Option<Page>);

impl Drop for TabGuard {
    fn drop(&mut self) {
        if let Some(page) = self.0.take() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    let _ = page.close().await;
                });
            }
        }
    }
}

/// Renders pages in one shared Chromium instance, a new tab per attempt.
pub struct ChromiumRenderer {
    // Dropped before `profile`, so the browser goes away before its
    // profile directory is removed.
    session: OnceCell<BrowserSession>,
    profile: ProfileDir,
}

impl fmt::Debug for ChromiumRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromiumRenderer")
            .field("profile", &self.profile.0)
            .field("launched", &self.session.initialized())
            .finish()
    }
}

impl Default for ChromiumRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChromiumRenderer {
    /// Creates a renderer with its own profile directory. The browser is
    /// not started until the first render.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: OnceCell::new(),
            profile: ProfileDir::unique(),
        }
    }

    /// Profile directory handed to Chromium.
    #[must_use]
    pub fn profile_dir(&self) -> &Path {
        &self.profile.0
    }

    /// Returns `true` once the browser has been started.
    #[must_use]
    pub fn is_launched(&self) -> bool {
        self.session.initialized()
    }

    async fn launch(&self) -> Result<BrowserSession, String> {
        let config = BrowserConfig::builder()
            .user_data_dir(&self.profile.0)
            .build()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| e.to_string())?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser event error");
                }
            }
        });

        tracing::info!(profile = %self.profile.0.display(), "browser started");
        Ok(BrowserSession { browser, events })
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render(&self, url: &Url, settle: Duration) -> Result<String, FetchError> {
        let browser_err = |reason: String| FetchError::Browser {
            url: url.to_string(),
            reason,
        };

        let session = self
            .session
            .get_or_try_init(|| self.launch())
            .await
            .map_err(browser_err)?;

        let page = session
            .browser
            .new_page(url.as_str())
            .await
            .map_err(|e| browser_err(e.to_string()))?;
        let tab = TabGuard(Some(page.clone()));

        tokio::time::sleep(settle).await;
        let captured = async {
            page.find_element("body").await?;
            page.content().await
        }
        .await;

        drop(tab);
        captured.map_err(|e| browser_err(e.to_string()))
    }
}

/// [`Fetch`] implementation over a [`PageRenderer`] with bounded retries.
pub struct RenderedFetcher<R> {
    renderer: R,
    settings: RenderSettings,
    retry_marker: Option<String>,
}

impl<R: fmt::Debug> fmt::Debug for RenderedFetcher<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedFetcher")
            .field("renderer", &self.renderer)
            .field("settings", &self.settings)
            .field("retry_marker", &self.retry_marker)
            .finish()
    }
}

impl<R: PageRenderer> RenderedFetcher<R> {
    /// Creates a fetcher. `retry_marker` is the substring that marks an
    /// incomplete render for this shop.
    #[must_use]
    pub fn new(renderer: R, settings: RenderSettings, retry_marker: Option<String>) -> Self {
        Self {
            renderer,
            settings,
            retry_marker,
        }
    }

    fn is_incomplete(&self, html: &str) -> bool {
        self.retry_marker
            .as_deref()
            .is_some_and(|marker| html.contains(marker))
    }
}

#[async_trait]
impl<R: PageRenderer> Fetch for RenderedFetcher<R> {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let rendered = tokio::time::timeout(
                self.settings.timeout,
                self.renderer.render(url, self.settings.settle),
            )
            .await;

            let err = match rendered {
                Ok(Ok(html)) if !self.is_incomplete(&html) => return Ok(html),
                Ok(Ok(_)) => FetchError::RenderIncomplete {
                    url: url.to_string(),
                    attempts: attempt,
                },
                Ok(Err(e)) => e,
                Err(_) => FetchError::Timeout {
                    url: url.to_string(),
                    attempts: attempt,
                },
            };

            if !err.is_retryable() || attempt >= max_attempts {
                return Err(err);
            }

            tracing::warn!(%url, attempt, max_attempts, error = %err, "render attempt failed, retrying");
            attempt += 1;
        }
    }
}
