//! Service layer: the crawl and notification passes and their daemons.
//!
//! [`CrawlService`] drives the orchestrator and owns the write path into
//! the ledger. [`NotifyService`] owns the notification path. Both are
//! one-shot; [`daemon::run_periodic`] repeats either on an interval.

pub mod crawl_service;
pub mod daemon;
pub mod notify_service;

pub use crawl_service::{CrawlService, CrawlSummary};
pub use notify_service::{LogNotifier, NotifyService, Notifier};
