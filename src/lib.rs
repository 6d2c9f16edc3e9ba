//! # shopwatch
//!
//! Crawls web shop catalogs, normalizes the listings, and keeps a
//! PostgreSQL ledger of every product's current and previous price.
//!
//! Each configured start URL is a crawl job that follows "next page"
//! links until they run out. Jobs of one shop share a bounded number of
//! worker slots; shops crawl in parallel. Collected listings are merged
//! into the ledger with one conditional upsert per product, price changes
//! reset the notification flag, and rows not seen for a while are reaped.
//!
//! ## Architecture
//!
//! ```text
//! CLI (crawl | notify | serve | schema)
//!     │
//!     ├── CrawlService / NotifyService (service/)
//!     │       │
//!     │       ├── Orchestrator ── CrawlJob (crawl/)
//!     │       │       ├── Fetch: static | rendered (fetch/)
//!     │       │       ├── Extractor (extract/)
//!     │       │       └── price + url normalization (domain/)
//!     │       │
//!     │       └── Notifier
//!     │
//!     ├── REST listing (api/)
//!     │
//!     └── ProductStore: PostgreSQL | in-memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod crawl;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod persistence;
pub mod service;
