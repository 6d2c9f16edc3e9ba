//! Shop-specific price text normalization.
//!
//! Prices are stored as whole currency units. Each shop declares which
//! separator convention its catalog uses; the fractional part is dropped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PriceError};

/// Currency tokens removed before integer parsing.
const CURRENCY_TOKENS: [&str; 2] = ["EUR", "€"];

/// Separator convention used by a shop's price text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceFormat {
    /// `1499.00` or `1499,00`: everything from the first `.` or `,` is
    /// the fractional part.
    #[default]
    Plain,
    /// `1.499,00€`: `,` starts the fraction, `.` groups thousands.
    Reverse,
    /// `1 499 EUR 2 055 EUR`: a sale price followed by the struck-through
    /// original in the same text node; only the first is kept.
    DoubleEur,
}

impl PriceFormat {
    /// Config name of this format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Reverse => "reverse",
            Self::DoubleEur => "double_eur",
        }
    }
}

impl fmt::Display for PriceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "plain" | "default" => Ok(Self::Plain),
            "reverse" => Ok(Self::Reverse),
            "double_eur" => Ok(Self::DoubleEur),
            other => Err(ConfigError::UnknownPriceFormat(other.to_string())),
        }
    }
}

/// Returns the cleaned integer text for `raw` under `format`, before
/// parsing.
#[must_use]
pub fn normalize(raw: &str, format: PriceFormat) -> String {
    let head = match format {
        PriceFormat::Reverse => first_part(raw, ",").replace('.', ""),
        PriceFormat::DoubleEur => first_part(raw, "EUR").to_string(),
        PriceFormat::Plain => first_part(first_part(raw, "."), ",").to_string(),
    };

    let mut cleaned: String = head.chars().filter(|c| !c.is_whitespace()).collect();
    for token in CURRENCY_TOKENS {
        cleaned = cleaned.replace(token, "");
    }
    cleaned
}

/// Parses price text into whole currency units.
///
/// # Errors
///
/// Returns [`PriceError::Unparseable`] when the cleaned text is not an
/// integer.
pub fn parse_price(raw: &str, format: PriceFormat) -> Result<i64, PriceError> {
    let cleaned = normalize(raw, format);
    cleaned.parse::<i64>().map_err(|_| PriceError::Unparseable {
        raw: raw.to_string(),
        cleaned,
    })
}

/// Picks an item's price from its candidate texts.
///
/// `groups` holds one entry per configured price selector, in order, with
/// the text of every node that selector matched. A selector that matched
/// exactly one node is a fast path: if that node parses, its value is the
/// price outright. Otherwise every parsable candidate competes and the
/// lowest wins (sale price next to the crossed-out original). Candidates
/// that fail to parse, including a lone fast-path node, are skipped.
///
/// # Errors
///
/// Returns [`PriceError::NoPrice`] when no candidate parses.
pub fn select_price<S: AsRef<str>>(groups: &[Vec<S>], format: PriceFormat) -> Result<i64, PriceError> {
    let mut lowest: Option<i64> = None;

    for group in groups {
        if let [only] = group.as_slice() {
            match parse_price(only.as_ref(), format) {
                Ok(price) => return Ok(price),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping price candidate");
                    continue;
                }
            }
        }

        for candidate in group {
            match parse_price(candidate.as_ref(), format) {
                Ok(price) => lowest = Some(lowest.map_or(price, |low| low.min(price))),
                Err(e) => tracing::debug!(error = %e, "skipping price candidate"),
            }
        }
    }

    lowest.ok_or(PriceError::NoPrice)
}

fn first_part<'a>(text: &'a str, separator: &str) -> &'a str {
    text.split(separator).next().unwrap_or(text)
}
