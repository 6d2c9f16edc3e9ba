//! Turns a raw extracted page into listings ready for the store.

use chrono::{DateTime, Utc};
use url::Url;

use crate::config::ShopConfig;
use crate::domain::{ProductListing, ResolveOptions, resolve, select_price};
use crate::error::PriceError;
use crate::extract::RawPage;

/// Normalized content of one fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageListings {
    /// Listings in document order, without repeats.
    pub listings: Vec<ProductListing>,
    /// Canonical next-page URL; `None` ends pagination.
    pub next_page: Option<Url>,
}

/// Resolves links, normalizes prices, and drops repeated entries.
///
/// An item whose link fails to resolve, or which has no name or link, is
/// skipped. An item without a parsable price is kept with price `0`. A
/// next-page link that fails to resolve ends pagination.
#[must_use]
pub fn assemble(
    raw: RawPage,
    page_url: &Url,
    shop: &ShopConfig,
    options: &ResolveOptions,
    observed_at: DateTime<Utc>,
) -> PageListings {
    let mut listings: Vec<ProductListing> = Vec::with_capacity(raw.items.len());

    for item in raw.items {
        if item.name.is_empty() {
            continue;
        }

        let link = match resolve(item.link.as_deref().unwrap_or_default(), page_url, options) {
            Ok(Some(link)) => link,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(shop = %shop.name, item = %item.name, error = %e, "skipping item");
                continue;
            }
        };

        let price = if shop.selectors.prices.is_empty() {
            0
        } else {
            match select_price(&item.price_candidates, shop.price_format) {
                Ok(price) => price,
                Err(PriceError::NoPrice | PriceError::Unparseable { .. }) => {
                    tracing::warn!(shop = %shop.name, item = %item.name, "failed to get price");
                    0
                }
            }
        };

        let listing = ProductListing::new(item.name, &*shop.name, price, link.as_str(), observed_at);
        if !listings.iter().any(|seen| seen.same_entry(&listing)) {
            listings.push(listing);
        }
    }

    let next_page = match raw.next_page.as_deref().map(|href| resolve(href, page_url, options)) {
        None | Some(Ok(None)) => None,
        Some(Ok(Some(url))) => Some(url),
        Some(Err(e)) => {
            tracing::warn!(shop = %shop.name, page = %page_url, error = %e, "unusable next page link");
            None
        }
    };

    PageListings {
        listings,
        next_page,
    }
}
