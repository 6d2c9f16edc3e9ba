//! A single pagination chain: one start URL of one shop.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use url::Url;

use super::page::assemble;
use crate::config::ShopConfig;
use crate::domain::{ProductListing, ResolveOptions};
use crate::extract::Extractor;
use crate::fetch::Fetch;

/// How a crawl job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Pagination ran out, looped back, or hit the page limit.
    Done {
        /// Pages fetched.
        pages: usize,
        /// Listings emitted.
        listings: usize,
    },
    /// A page could not be fetched or extracted. Batches emitted before
    /// the failure stay emitted.
    Failed {
        /// Pages fetched successfully before the failure.
        pages: usize,
        /// Listings emitted before the failure.
        listings: usize,
        /// What went wrong.
        error: String,
    },
    /// The aggregation side stopped listening.
    Abandoned {
        /// Pages fetched.
        pages: usize,
    },
}

/// Everything a job needs, shared by all jobs of one shop.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Shop being crawled.
    pub shop: Arc<ShopConfig>,
    /// Fetch strategy for the shop.
    pub fetcher: Arc<dyn Fetch>,
    /// Extractor for the shop.
    pub extractor: Arc<dyn Extractor>,
    /// Link canonicalization for the shop.
    pub resolve: Arc<ResolveOptions>,
}

/// One crawl job, owned by the task that runs it.
#[derive(Debug)]
pub struct CrawlJob {
    ctx: JobContext,
    current: Url,
    visited: HashSet<Url>,
    pages: usize,
    listings: usize,
}

impl CrawlJob {
    /// Creates a job positioned at `start`.
    #[must_use]
    pub fn new(ctx: JobContext, start: Url) -> Self {
        Self {
            ctx,
            visited: HashSet::from([start.clone()]),
            current: start,
            pages: 0,
            listings: 0,
        }
    }

    /// Follows pagination from the start URL, sending each page's
    /// listings to `sink` as soon as the page is processed.
    ///
    /// Stops when a page has no next link or links back to any page this
    /// job already fetched.
    pub async fn run(mut self, sink: mpsc::Sender<Vec<ProductListing>>) -> JobOutcome {
        let shop = Arc::clone(&self.ctx.shop);

        loop {
            tracing::info!(shop = %shop.name, url = %self.current, "scraping");

            let document = match self.ctx.fetcher.fetch(&self.current).await {
                Ok(document) => document,
                Err(e) => return self.failed(e.to_string()),
            };

            let raw = match self.ctx.extractor.extract(&document) {
                Ok(raw) => raw,
                Err(e) => return self.failed(e.to_string()),
            };
            self.pages += 1;

            let page = assemble(raw, &self.current, &shop, &self.ctx.resolve, Utc::now());
            let count = page.listings.len();
            if count > 0 {
                if sink.send(page.listings).await.is_err() {
                    tracing::warn!(shop = %shop.name, "aggregation closed, stopping job");
                    return JobOutcome::Abandoned { pages: self.pages };
                }
                self.listings += count;
            }

            let Some(next) = page.next_page else {
                return self.done();
            };
            if !self.visited.insert(next.clone()) {
                tracing::debug!(shop = %shop.name, url = %next, "next page already visited");
                return self.done();
            }

            if shop.max_pages.is_some_and(|max| self.pages >= max) {
                tracing::debug!(shop = %shop.name, pages = self.pages, "page limit reached");
                return self.done();
            }

            self.current = next;
        }
    }

    fn done(&self) -> JobOutcome {
        JobOutcome::Done {
            pages: self.pages,
            listings: self.listings,
        }
    }

    fn failed(&self, error: String) -> JobOutcome {
        tracing::warn!(shop = %self.ctx.shop.name, url = %self.current, %error, "crawl job failed");
        JobOutcome::Failed {
            pages: self.pages,
            listings: self.listings,
            error,
        }
    }
}
