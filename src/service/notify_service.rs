//! Notification pass: report rows whose current price is unreported.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ShopwatchError;
use crate::persistence::{LedgerRow, PriceEvent, ProductStore};

/// Delivers pending price events downstream.
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Delivers one report covering every row in `rows`.
    ///
    /// # Errors
    ///
    /// Returns [`ShopwatchError::Delivery`] if the report was not sent.
    /// The rows stay pending in that case.
    async fn deliver(&self, rows: &[LedgerRow]) -> Result<(), ShopwatchError>;
}

/// Writes each event to the log instead of an external channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, rows: &[LedgerRow]) -> Result<(), ShopwatchError> {
        for row in rows {
            match row.price_event() {
                PriceEvent::New { price } => {
                    tracing::info!(shop = %row.shop, name = %row.name, price, link = %row.link, "new product");
                }
                PriceEvent::Dropped { from, to } => {
                    tracing::info!(shop = %row.shop, name = %row.name, from, to, link = %row.link, "price dropped");
                }
                PriceEvent::Raised { from, to } => {
                    tracing::info!(shop = %row.shop, name = %row.name, from, to, link = %row.link, "price raised");
                }
            }
        }
        Ok(())
    }
}

/// Reads unnotified rows, delivers them, and marks them notified.
#[derive(Debug, Clone)]
pub struct NotifyService {
    store: Arc<dyn ProductStore>,
    notifier: Arc<dyn Notifier>,
}

impl NotifyService {
    /// Creates a new `NotifyService`.
    #[must_use]
    pub fn new(store: Arc<dyn ProductStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Runs one notification pass. Returns the number of rows marked.
    ///
    /// Rows are only marked after the notifier reports success, so a
    /// failed delivery is retried on the next pass. A row whose price
    /// changed while the report was in flight is not marked.
    ///
    /// # Errors
    ///
    /// Returns the store's error, or the notifier's error if delivery
    /// failed.
    pub async fn run_once(&self) -> Result<u64, ShopwatchError> {
        let pending = self.store.list_unnotified().await?;
        if pending.is_empty() {
            tracing::debug!("nothing to notify");
            return Ok(0);
        }

        tracing::info!(rows = pending.len(), "delivering price notifications");
        self.notifier.deliver(&pending).await?;

        let marked = self.store.mark_reported(&pending).await?;
        let repriced = (pending.len() as u64).saturating_sub(marked);
        if repriced > 0 {
            tracing::info!(repriced, "rows repriced during delivery stay pending");
        }
        tracing::info!(marked, "notifications delivered");
        Ok(marked)
    }
}
