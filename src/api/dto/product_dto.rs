//! Ledger rows as served by the listing endpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::persistence::LedgerRow;

/// One ledger row in the `GET /products` response.
///
/// Field names are camelCase; `previousPrice` is `null` until the first
/// price change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    /// Product name.
    pub name: String,
    /// Shop name.
    pub shop: String,
    /// Price before the most recent change.
    pub previous_price: Option<i64>,
    /// Current price.
    pub price: i64,
    /// Canonical product URL.
    pub link: String,
    /// First observation time.
    pub first_seen: DateTime<Utc>,
    /// Most recent observation time.
    pub last_seen: DateTime<Utc>,
    /// Whether the current price has been reported.
    pub notified: bool,
}

impl From<LedgerRow> for ProductDto {
    fn from(row: LedgerRow) -> Self {
        Self {
            name: row.name,
            shop: row.shop,
            previous_price: row.previous_price,
            price: row.price,
            link: row.link,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
            notified: row.notified,
        }
    }
}
