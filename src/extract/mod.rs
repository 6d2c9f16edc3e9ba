//! Extraction of raw product data from catalog markup.
//!
//! Extractors only locate text: names, price candidate strings, and
//! link fragments. Price normalization and link resolution are applied
//! afterwards by the crawl, so every extractor gets the same treatment.

pub mod selector;

pub use selector::SelectorExtractor;

use crate::error::ShopwatchError;

/// One product as located on a page, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawItem {
    /// Product name as found, already trimmed.
    pub name: String,
    /// Candidate price texts, one group per price selector in order.
    pub price_candidates: Vec<Vec<String>>,
    /// Link fragment as found, if any.
    pub link: Option<String>,
}

/// Everything extracted from one page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawPage {
    /// Products in document order.
    pub items: Vec<RawItem>,
    /// Link fragment of the next catalog page, if any.
    pub next_page: Option<String>,
}

/// Pulls raw items and the next-page link out of a document.
pub trait Extractor: Send + Sync + std::fmt::Debug {
    /// Extracts the page.
    ///
    /// # Errors
    ///
    /// Returns [`ShopwatchError::Extraction`] if the document cannot be
    /// processed at all. Individual items that lack data are simply left
    /// out.
    fn extract(&self, document: &str) -> Result<RawPage, ShopwatchError>;
}
