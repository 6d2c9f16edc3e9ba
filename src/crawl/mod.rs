//! Crawling: pagination chains per start URL, fanned in across shops.
//!
//! ```text
//! Orchestrator
//!     ├── per shop: Semaphore(worker cap)
//!     │       └── CrawlJob per start URL ── fetch → extract → assemble
//!     └── mpsc sink ◄── page batches from every job
//! ```

pub mod job;
pub mod orchestrator;
pub mod page;

pub use job::{CrawlJob, JobContext, JobOutcome};
pub use orchestrator::{CrawlReport, Orchestrator, ShopPlan};
pub use page::{PageListings, assemble};
