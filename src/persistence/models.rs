//! Ledger row model and the price-change rule applied on every merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ProductListing;

/// Identity of a ledger row. Unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductKey {
    /// Product name.
    pub name: String,
    /// Shop name.
    pub shop: String,
    /// Canonical product URL.
    pub link: String,
}

impl ProductKey {
    /// Creates a key from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, shop: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shop: shop.into(),
            link: link.into(),
        }
    }
}

impl From<&ProductListing> for ProductKey {
    fn from(listing: &ProductListing) -> Self {
        Self::new(&*listing.name, &*listing.shop, &*listing.link)
    }
}

/// A row of the `products` ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// Product name.
    pub name: String,
    /// Shop name.
    pub shop: String,
    /// Price before the most recent change, absent until the first change.
    pub previous_price: Option<i64>,
    /// Current price.
    pub price: i64,
    /// Canonical product URL.
    pub link: String,
    /// First observation. Never changes after insert.
    pub first_seen: DateTime<Utc>,
    /// Most recent observation.
    pub last_seen: DateTime<Utc>,
    /// Whether the current price has been reported downstream.
    pub notified: bool,
}

/// What a notification about a row should say.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceEvent {
    /// Row has no price history yet.
    New {
        /// Current price.
        price: i64,
    },
    /// Price went down.
    Dropped {
        /// Price before the change.
        from: i64,
        /// Current price.
        to: i64,
    },
    /// Price went up.
    Raised {
        /// Price before the change.
        from: i64,
        /// Current price.
        to: i64,
    },
}

impl LedgerRow {
    /// Creates the row for a key's first observation.
    #[must_use]
    pub fn first_observation(listing: &ProductListing) -> Self {
        Self {
            name: listing.name.clone(),
            shop: listing.shop.clone(),
            previous_price: None,
            price: listing.price,
            link: listing.link.clone(),
            first_seen: listing.observed_at,
            last_seen: listing.observed_at,
            notified: listing.notified,
        }
    }

    /// Folds a later observation of the same key into this row.
    ///
    /// `last_seen` always advances to the observation time. On a price
    /// change the old price moves to `previous_price` and `notified`
    /// resets; otherwise both are left alone.
    pub fn observe(&mut self, listing: &ProductListing) {
        if listing.price != self.price {
            self.previous_price = Some(self.price);
            self.price = listing.price;
            self.notified = false;
        }
        self.last_seen = listing.observed_at;
    }

    /// Returns the identity key of this row.
    #[must_use]
    pub fn key(&self) -> ProductKey {
        ProductKey::new(&*self.name, &*self.shop, &*self.link)
    }

    /// Classifies the row's latest price event.
    #[must_use]
    pub fn price_event(&self) -> PriceEvent {
        match self.previous_price {
            None => PriceEvent::New { price: self.price },
            Some(from) if self.price < from => PriceEvent::Dropped {
                from,
                to: self.price,
            },
            Some(from) => PriceEvent::Raised {
                from,
                to: self.price,
            },
        }
    }
}
