//! Crawl pass: scrape every shop, merge into the ledger, reap stale rows.

use std::sync::Arc;

use crate::crawl::Orchestrator;
use crate::error::ShopwatchError;
use crate::persistence::ProductStore;

/// Counts from one crawl pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Listings collected across all shops.
    pub scraped: usize,
    /// Listings that created a new ledger row.
    pub new_products: usize,
    /// Rows removed by the retention sweep.
    pub reaped: u64,
    /// Jobs that failed or were abandoned.
    pub failed_jobs: usize,
}

/// Runs crawl passes against a store.
#[derive(Debug, Clone)]
pub struct CrawlService {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn ProductStore>,
    retention: chrono::Duration,
}

impl CrawlService {
    /// Creates a new `CrawlService`.
    #[must_use]
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn ProductStore>,
        retention: chrono::Duration,
    ) -> Self {
        Self {
            orchestrator,
            store,
            retention,
        }
    }

    /// Crawls all shops once, merges the results, then deletes rows not
    /// seen within the retention window.
    ///
    /// # Errors
    ///
    /// Returns [`ShopwatchError::PersistenceError`] if the merge or the
    /// sweep fails. Crawl job failures are not errors here; they are
    /// counted in the summary.
    pub async fn run_once(&self) -> Result<CrawlSummary, ShopwatchError> {
        let report = self.orchestrator.run().await;

        for listing in &report.listings {
            tracing::debug!(
                shop = %listing.shop,
                name = %listing.name,
                price = listing.price,
                link = %listing.link,
                "scraped product"
            );
        }

        let created = self.store.merge(&report.listings).await?;
        for listing in &created {
            tracing::debug!(shop = %listing.shop, name = %listing.name, price = listing.price, "new product");
        }

        let reaped = self.store.reap(self.retention).await?;

        let summary = CrawlSummary {
            scraped: report.listings.len(),
            new_products: created.len(),
            reaped,
            failed_jobs: report.failed_jobs,
        };
        tracing::info!(
            scraped = summary.scraped,
            new_products = summary.new_products,
            reaped = summary.reaped,
            failed_jobs = summary.failed_jobs,
            "crawl pass complete"
        );
        Ok(summary)
    }
}
