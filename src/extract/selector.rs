//! CSS-selector extraction over parsed HTML.

use scraper::{ElementRef, Html, Selector};

use super::{Extractor, RawItem, RawPage};
use crate::config::Selectors;
use crate::error::{ConfigError, ShopwatchError};

/// Characters trimmed from both ends of product names.
const NAME_TRIM: &[char] = &['-', '.', ' ', '\t', '\n', '\r', '\u{a0}'];

/// Extractor driven by a shop's configured selectors.
///
/// Selectors are compiled once, when the shop is set up.
#[derive(Debug)]
pub struct SelectorExtractor {
    item: Selector,
    name: Selector,
    prices: Vec<Selector>,
    link: Selector,
    next_page: Option<Selector>,
}

impl SelectorExtractor {
    /// Compiles the selectors for `shop`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSelector`] for the first selector that
    /// fails to parse.
    pub fn new(shop: &str, selectors: &Selectors) -> Result<Self, ConfigError> {
        let compile = |selector: &str| {
            Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
                shop: shop.to_string(),
                selector: selector.to_string(),
                reason: e.to_string(),
            })
        };

        Ok(Self {
            item: compile(&selectors.item)?,
            name: compile(&selectors.name)?,
            prices: selectors
                .prices
                .iter()
                .map(|s| compile(s))
                .collect::<Result<_, _>>()?,
            link: compile(&selectors.link)?,
            next_page: selectors.next_page.as_deref().map(compile).transpose()?,
        })
    }

    fn item(&self, element: ElementRef<'_>) -> RawItem {
        let name: String = element.select(&self.name).flat_map(|e| e.text()).collect();

        let price_candidates = self
            .prices
            .iter()
            .map(|selector| {
                element
                    .select(selector)
                    .map(|node| node.text().collect::<String>())
                    .collect()
            })
            .collect();

        let link = element
            .select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);

        RawItem {
            name: name.trim_matches(NAME_TRIM).to_string(),
            price_candidates,
            link,
        }
    }
}

impl Extractor for SelectorExtractor {
    fn extract(&self, document: &str) -> Result<RawPage, ShopwatchError> {
        let html = Html::parse_document(document);

        let items = html
            .select(&self.item)
            .map(|element| self.item(element))
            .collect();

        let next_page = self.next_page.as_ref().and_then(|selector| {
            html.select(selector)
                .find_map(|a| a.value().attr("href"))
                .map(str::to_string)
        });

        Ok(RawPage { items, next_page })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <ul>
            <li class="product">
              <a href="./p1.html?sid=9"><span class="title"> - Road Bike. </span></a>
              <div class="price"><del>2 055,00 €</del><ins>1 499,00 €</ins></div>
            </li>
            <li class="product">
              <a href="/p/2"><span class="title">Helmet</span></a>
              <div class="price"><span class="amount">89,90 €</span></div>
            </li>
            <li class="product">
              <span class="title">No link here</span>
            </li>
          </ul>
          <nav><span class="next">disabled</span><a class="next" href="?page=2">Next</a></nav>
        </body></html>
    "#;

    fn selectors(prices: &[&str], next: Option<&str>) -> Selectors {
        Selectors {
            item: "li.product".to_string(),
            name: ".title".to_string(),
            prices: prices.iter().map(|s| (*s).to_string()).collect(),
            link: "a".to_string(),
            next_page: next.map(str::to_string),
        }
    }

    fn extract(sel: &Selectors) -> RawPage {
        let Ok(extractor) = SelectorExtractor::new("Bikes", sel) else {
            panic!("selectors compile");
        };
        let Ok(page) = extractor.extract(PAGE) else {
            panic!("extraction failed");
        };
        page
    }

    #[test]
    fn finds_items_names_and_links() {
        let page = extract(&selectors(&[], None));
        let names: Vec<&str> = page.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Road Bike", "Helmet", "No link here"]);

        let links: Vec<Option<&str>> = page.items.iter().map(|i| i.link.as_deref()).collect();
        assert_eq!(links, [Some("./p1.html?sid=9"), Some("/p/2"), None]);
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn groups_price_candidates_per_selector() {
        let page = extract(&selectors(&[".price del, .price ins", ".amount"], None));
        let Some(bike) = page.items.first() else {
            panic!("bike item");
        };
        assert_eq!(
            bike.price_candidates,
            vec![
                vec!["2 055,00 €".to_string(), "1 499,00 €".to_string()],
                Vec::new()
            ]
        );
        let Some(helmet) = page.items.get(1) else {
            panic!("helmet item");
        };
        assert_eq!(
            helmet.price_candidates,
            vec![Vec::new(), vec!["89,90 €".to_string()]]
        );
    }

    #[test]
    fn next_page_is_first_anchor_with_href() {
        let page = extract(&selectors(&[], Some(".next")));
        assert_eq!(page.next_page.as_deref(), Some("?page=2"));
    }

    #[test]
    fn invalid_selector_is_config_error() {
        let mut sel = selectors(&[], None);
        sel.item = "li[".to_string();
        let result = SelectorExtractor::new("Bikes", &sel);
        assert!(matches!(result, Err(ConfigError::InvalidSelector { .. })));
    }
}
