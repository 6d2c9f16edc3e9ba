//! Persistence layer: the change-detection ledger.
//!
//! [`ProductStore`] is the contract the crawl, notification, and query
//! paths share. [`postgres::PostgresStore`] is the production back end;
//! [`memory::MemoryStore`] keeps the same semantics in process.
//!
//! Both back ends merge every listing as a single conditional upsert per
//! identity key, so concurrent merges of one key never observe a
//! half-applied row and key collisions never surface as errors.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::Duration;

pub use memory::MemoryStore;
pub use models::{LedgerRow, PriceEvent, ProductKey};
pub use postgres::PostgresStore;

use crate::domain::ProductListing;
use crate::error::ShopwatchError;

/// Durable product ledger with price history and notification state.
#[async_trait]
pub trait ProductStore: Send + Sync + std::fmt::Debug {
    /// Creates the ledger table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ShopwatchError::PersistenceError`] on database failure.
    async fn ensure_schema(&self) -> Result<(), ShopwatchError>;

    /// Drops the ledger table if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`ShopwatchError::PersistenceError`] on database failure.
    async fn drop_schema(&self) -> Result<(), ShopwatchError>;

    /// Merges observed listings into the ledger and returns the ones that
    /// created a new row.
    ///
    /// # Errors
    ///
    /// Returns [`ShopwatchError::PersistenceError`] on database failure.
    /// Listings merged before the failure stay merged.
    async fn merge(&self, batch: &[ProductListing]) -> Result<Vec<ProductListing>, ShopwatchError>;

    /// Deletes rows last seen before `now - older_than`. Returns the
    /// number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`ShopwatchError::PersistenceError`] on database failure.
    async fn reap(&self, older_than: Duration) -> Result<u64, ShopwatchError>;

    /// Returns every row.
    ///
    /// # Errors
    ///
    /// Returns [`ShopwatchError::PersistenceError`] on database failure.
    async fn list_all(&self) -> Result<Vec<LedgerRow>, ShopwatchError>;

    /// Returns rows whose current price has not been reported.
    ///
    /// # Errors
    ///
    /// Returns [`ShopwatchError::PersistenceError`] on database failure.
    async fn list_unnotified(&self) -> Result<Vec<LedgerRow>, ShopwatchError>;

    /// Sets `notified` for exactly the given keys. Returns the number of
    /// rows updated.
    ///
    /// # Errors
    ///
    /// Returns [`ShopwatchError::PersistenceError`] on database failure.
    async fn mark_notified(&self, keys: &[ProductKey]) -> Result<u64, ShopwatchError>;

    /// Sets `notified` for the given rows, but only where the stored price
    /// still equals the row's price. A row re-priced after it was read
    /// stays pending. Returns the number of rows updated.
    ///
    /// # Errors
    ///
    /// Returns [`ShopwatchError::PersistenceError`] on database failure.
    async fn mark_reported(&self, rows: &[LedgerRow]) -> Result<u64, ShopwatchError>;
}
