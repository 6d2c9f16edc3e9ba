//! Concurrent crawl of every configured shop with per-shop admission gates.
//!
//! Each start URL becomes a [`CrawlJob`] running in its own task. A
//! counting semaphore per shop caps how many of that shop's jobs run at
//! once; shops do not limit each other. All jobs stream their page batches
//! into one channel, and [`Orchestrator::run`] returns only after every job
//! task has finished and the channel has been drained.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

use super::job::{CrawlJob, JobContext, JobOutcome};
use crate::config::{RenderSettings, ShopConfig};
use crate::domain::{ProductListing, ResolveOptions};
use crate::error::ConfigError;
use crate::extract::{Extractor, SelectorExtractor};
use crate::fetch::{Fetch, fetcher_for};

/// Buffered page batches between jobs and the aggregator.
const SINK_CAPACITY: usize = 64;

/// A shop ready to crawl: its strategy objects and worker cap.
#[derive(Debug, Clone)]
pub struct ShopPlan {
    ctx: JobContext,
    workers: usize,
}

impl ShopPlan {
    /// Assembles a plan from explicit collaborators.
    #[must_use]
    pub fn new(
        shop: ShopConfig,
        fetcher: Arc<dyn Fetch>,
        extractor: Arc<dyn Extractor>,
        workers: usize,
    ) -> Self {
        let resolve = ResolveOptions::new(shop.unique_parameters.iter().cloned(), shop.strip_fragment);
        Self {
            ctx: JobContext {
                shop: Arc::new(shop),
                fetcher,
                extractor,
                resolve: Arc::new(resolve),
            },
            workers: workers.max(1),
        }
    }

    /// Builds the plan for a configured shop: fetch strategy by shop kind,
    /// selector extractor, and the effective worker cap.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSelector`] if a selector does not
    /// compile.
    pub fn from_config(
        shop: ShopConfig,
        client: &reqwest::Client,
        render: RenderSettings,
        default_workers: usize,
    ) -> Result<Self, ConfigError> {
        let extractor = SelectorExtractor::new(&shop.name, &shop.selectors)?;
        let fetcher = fetcher_for(&shop, client, render);
        let workers = shop.worker_limit(default_workers);
        Ok(Self::new(shop, fetcher, Arc::new(extractor), workers))
    }

    /// Shop this plan crawls.
    #[must_use]
    pub fn shop(&self) -> &ShopConfig {
        &self.ctx.shop
    }

    /// Maximum number of this shop's jobs running at once.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }
}

/// Result of one crawl over all shops.
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Every emitted listing, in arrival order.
    pub listings: Vec<ProductListing>,
    /// Jobs started.
    pub jobs: usize,
    /// Jobs that ended in failure.
    pub failed_jobs: usize,
}

/// Drives crawl jobs for a fixed set of shops.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    plans: Vec<ShopPlan>,
}

impl Orchestrator {
    /// Creates an orchestrator over `plans`.
    #[must_use]
    pub fn new(plans: Vec<ShopPlan>) -> Self {
        Self { plans }
    }

    /// Shops covered by this orchestrator.
    #[must_use]
    pub fn plans(&self) -> &[ShopPlan] {
        &self.plans
    }

    /// Crawls every start URL of every shop and aggregates the results.
    ///
    /// Job failures are logged and counted; they never stop other jobs.
    pub async fn run(&self) -> CrawlReport {
        let (sink, mut batches) = mpsc::channel::<Vec<ProductListing>>(SINK_CAPACITY);
        let mut tasks = JoinSet::new();

        for plan in &self.plans {
            let gate = Arc::new(Semaphore::new(plan.workers));
            tracing::info!(
                shop = %plan.ctx.shop.name,
                jobs = plan.ctx.shop.start_urls.len(),
                workers = plan.workers,
                "starting scraping"
            );

            for start in &plan.ctx.shop.start_urls {
                let job = CrawlJob::new(plan.ctx.clone(), start.clone());
                let gate = Arc::clone(&gate);
                let sink = sink.clone();
                tasks.spawn(async move {
                    let Ok(_permit) = gate.acquire_owned().await else {
                        return JobOutcome::Failed {
                            pages: 0,
                            listings: 0,
                            error: "admission gate closed".to_string(),
                        };
                    };
                    job.run(sink).await
                });
            }
        }
        // Only job tasks hold senders now; the channel closes when the
        // last one finishes.
        drop(sink);
        let jobs = tasks.len();

        let collect = async {
            let mut listings = Vec::new();
            while let Some(batch) = batches.recv().await {
                listings.extend(batch);
            }
            listings
        };

        let wait = async {
            let mut failed = 0;
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(JobOutcome::Done { .. }) => {}
                    Ok(JobOutcome::Failed { .. } | JobOutcome::Abandoned { .. }) => failed += 1,
                    Err(e) => {
                        tracing::error!(error = %e, "crawl task panicked");
                        failed += 1;
                    }
                }
            }
            failed
        };

        let (listings, failed_jobs) = tokio::join!(collect, wait);

        tracing::info!(jobs, failed_jobs, listings = listings.len(), "crawl finished");
        CrawlReport {
            listings,
            jobs,
            failed_jobs,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::parse_shops;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    /// Serves canned pages and records peak concurrency.
    #[derive(Debug, Default)]
    struct CannedFetcher {
        pages: HashMap<String, String>,
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl CannedFetcher {
        fn new(pages: &[(&str, String)], delay: Duration) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, body)| ((*u).to_string(), body.clone()))
                    .collect(),
                delay,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Fetch for CannedFetcher {
        async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    fn page(items: &[(&str, &str)], next: Option<&str>) -> String {
        let mut html = String::from("<html><body><ul>");
        for (name, href) in items {
            html.push_str(&format!(
                "<li><a href=\"{href}\"><b>{name}</b></a><i>100,00</i></li>"
            ));
        }
        html.push_str("</ul>");
        if let Some(next) = next {
            html.push_str(&format!("<a class=\"next\" href=\"{next}\">next</a>"));
        }
        html.push_str("</body></html>");
        html
    }

    fn shop(name: &str, urls: &[&str]) -> ShopConfig {
        let urls = urls
            .iter()
            .map(|u| format!("\"{u}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!(
            r#"
            [[shops]]
            type = "static"
            name = "{name}"
            urls = [{urls}]
            item_selector = "li"
            name_selector = "b"
            price_selectors = ["i"]
            link_selector = "a"
            next_page_selector = "a.next"
            "#
        );
        let Ok(mut shops) = parse_shops(&text) else {
            panic!("valid shop");
        };
        let Some(shop) = shops.pop() else {
            panic!("one shop");
        };
        shop
    }

    fn plan(shop: ShopConfig, fetcher: Arc<CannedFetcher>, workers: usize) -> ShopPlan {
        let Ok(extractor) = SelectorExtractor::new(&shop.name, &shop.selectors) else {
            panic!("selectors");
        };
        ShopPlan::new(shop, fetcher, Arc::new(extractor), workers)
    }

    #[tokio::test]
    async fn follows_pagination_until_it_ends() {
        let fetcher = Arc::new(CannedFetcher::new(
            &[
                ("https://a.test/c?p=1", page(&[("One", "/1")], Some("/c?p=2"))),
                ("https://a.test/c?p=2", page(&[("Two", "/2")], Some("/c?p=3"))),
                ("https://a.test/c?p=3", page(&[("Three", "/3")], None)),
            ],
            Duration::ZERO,
        ));
        let orchestrator = Orchestrator::new(vec![plan(
            shop("A", &["https://a.test/c?p=1"]),
            Arc::clone(&fetcher),
            3,
        )]);

        let report = orchestrator.run().await;
        let names: Vec<&str> = report.listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["One", "Two", "Three"]);
        assert_eq!((report.jobs, report.failed_jobs), (1, 0));
    }

    #[tokio::test]
    async fn next_page_equal_to_current_stops() {
        let fetcher = Arc::new(CannedFetcher::new(
            &[(
                "https://a.test/c",
                page(&[("Loop", "/l")], Some("https://a.test/c")),
            )],
            Duration::ZERO,
        ));
        let orchestrator =
            Orchestrator::new(vec![plan(shop("A", &["https://a.test/c"]), Arc::clone(&fetcher), 1)]);

        let report = orchestrator.run().await;
        assert_eq!(report.listings.len(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pages_linking_to_each_other_stop_after_one_visit_each() {
        let fetcher = Arc::new(CannedFetcher::new(
            &[
                ("https://a.test/a", page(&[("Alpha", "/x")], Some("/b"))),
                ("https://a.test/b", page(&[("Beta", "/y")], Some("/a"))),
            ],
            Duration::ZERO,
        ));
        let orchestrator =
            Orchestrator::new(vec![plan(shop("A", &["https://a.test/a"]), Arc::clone(&fetcher), 1)]);

        let finished =
            tokio::time::timeout(Duration::from_secs(2), orchestrator.run()).await;
        let Ok(report) = finished else {
            panic!("crawl did not terminate");
        };
        let names: Vec<&str> = report.listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Beta"]);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!((report.jobs, report.failed_jobs), (1, 0));
    }

    #[tokio::test]
    async fn worker_cap_bounds_concurrent_jobs_per_shop() {
        let urls: Vec<String> = (0..6).map(|i| format!("https://a.test/c{i}")).collect();
        let pages: Vec<(&str, String)> = urls
            .iter()
            .map(|u| (u.as_str(), page(&[("X", u.as_str())], None)))
            .collect();
        let fetcher = Arc::new(CannedFetcher::new(&pages, Duration::from_millis(30)));
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let orchestrator =
            Orchestrator::new(vec![plan(shop("A", &url_refs), Arc::clone(&fetcher), 2)]);

        let report = orchestrator.run().await;
        assert_eq!(report.jobs, 6);
        assert_eq!(report.listings.len(), 6);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_job_keeps_partial_results_and_siblings() {
        let fetcher = Arc::new(CannedFetcher::new(
            &[
                ("https://a.test/ok", page(&[("Fine", "/f")], None)),
                ("https://a.test/p1", page(&[("Early", "/e")], Some("/missing"))),
            ],
            Duration::ZERO,
        ));
        let orchestrator = Orchestrator::new(vec![plan(
            shop("A", &["https://a.test/ok", "https://a.test/p1", "https://a.test/404"]),
            Arc::clone(&fetcher),
            3,
        )]);

        let report = orchestrator.run().await;
        let mut names: Vec<&str> = report.listings.iter().map(|l| l.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, ["Early", "Fine"]);
        assert_eq!((report.jobs, report.failed_jobs), (3, 2));
    }

    #[tokio::test]
    async fn shops_are_not_bounded_by_each_other() {
        let fetcher = Arc::new(CannedFetcher::new(
            &[
                ("https://a.test/", page(&[("A", "/a")], None)),
                ("https://b.test/", page(&[("B", "/b")], None)),
            ],
            Duration::from_millis(30),
        ));
        let orchestrator = Orchestrator::new(vec![
            plan(shop("A", &["https://a.test/"]), Arc::clone(&fetcher), 1),
            plan(shop("B", &["https://b.test/"]), Arc::clone(&fetcher), 1),
        ]);

        let report = orchestrator.run().await;
        assert_eq!(report.listings.len(), 2);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
    }
}
