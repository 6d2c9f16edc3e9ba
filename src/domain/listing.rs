//! Product listings observed on a catalog page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One product as seen on one page at one moment.
///
/// Listings are not stored as such: the change-detection store folds
/// them into ledger rows keyed by `(name, shop, link)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductListing {
    /// Product name, trimmed.
    pub name: String,
    /// Shop the listing was found in.
    pub shop: String,
    /// Price in whole currency units; `0` when no price could be read.
    pub price: i64,
    /// Canonical absolute product URL.
    pub link: String,
    /// When the page carrying this listing was fetched.
    pub observed_at: DateTime<Utc>,
    /// Initial notified flag for newly created rows.
    pub notified: bool,
}

impl ProductListing {
    /// Creates a listing that has not been notified yet.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        shop: impl Into<String>,
        price: i64,
        link: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            shop: shop.into(),
            price,
            link: link.into(),
            observed_at,
            notified: false,
        }
    }

    /// Returns `true` if `other` is the same entry on the same page:
    /// equal name, price, and link.
    #[must_use]
    pub fn same_entry(&self, other: &Self) -> bool {
        self.name == other.name && self.price == other.price && self.link == other.link
    }
}
