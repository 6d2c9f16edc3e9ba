//! Domain layer: listings, price normalization, and link resolution.
//!
//! These are the pure helpers the crawl applies to extracted page data
//! before anything reaches the change-detection store.

pub mod listing;
pub mod price;
pub mod url_resolver;

pub use listing::ProductListing;
pub use price::{PriceFormat, parse_price, select_price};
pub use url_resolver::{ResolveOptions, resolve};
