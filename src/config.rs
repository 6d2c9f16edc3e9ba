//! Service configuration.
//!
//! Runtime settings come from environment variables (or a `.env` file via
//! `dotenvy`). Shop definitions come from a TOML file with one `[[shops]]`
//! table per shop. Everything is validated before the first fetch; any
//! problem is a [`ConfigError`] and stops the process.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::domain::PriceFormat;
use crate::error::ConfigError;

/// Default user agent for static fetches.
pub const DEFAULT_USER_AGENT: &str = concat!("shopwatch/", env!("CARGO_PKG_VERSION"));

/// Top-level runtime configuration.
///
/// Loaded once at startup via [`ServiceConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// PostgreSQL connection string.
    pub database_url: String,

    /// Ledger table name.
    pub table_name: String,

    /// Maximum number of database connections in the pool.
    pub database_max_connections: u32,

    /// Minimum idle connections in the pool.
    pub database_min_connections: u32,

    /// Timeout in seconds for acquiring a database connection.
    pub database_connect_timeout_secs: u64,

    /// Path of the shop definition file.
    pub shops_path: PathBuf,

    /// Default cap on concurrently running crawl jobs per shop.
    pub max_workers: usize,

    /// Pause between crawl runs in daemon mode.
    pub crawl_interval: Duration,

    /// Pause between notification runs in daemon mode.
    pub notify_interval: Duration,

    /// Rows not seen for this many days are deleted after each crawl.
    pub retention_days: u32,

    /// Socket address for the listing API.
    pub listen_addr: SocketAddr,

    /// Key expected in the `X-API-KEY` header. Required by `serve`.
    pub api_key: Option<String>,

    /// Request timeout for static fetches.
    pub http_timeout: Duration,

    /// User agent for static fetches.
    pub user_agent: String,

    /// Settings for headless rendering.
    pub render: RenderSettings,
}

/// Headless rendering limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Upper bound for one render attempt.
    pub timeout: Duration,
    /// Wait after navigation before the document is captured.
    pub settle: Duration,
    /// Total attempts for timeouts and incomplete renders.
    pub max_attempts: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            settle: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults for everything except the database URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] if `SHOPWATCH_DATABASE_URL` is
    /// unset, or [`ConfigError::InvalidValue`] / [`ConfigError::InvalidTableName`]
    /// for values that do not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("SHOPWATCH_DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField("SHOPWATCH_DATABASE_URL".to_string()))?;

        let table_name = std::env::var("SHOPWATCH_TABLE").unwrap_or_else(|_| "products".to_string());
        validate_table_name(&table_name)?;

        let listen_addr = parse_env_strict("SHOPWATCH_LISTEN_ADDR", "0.0.0.0:8080")?;

        let defaults = RenderSettings::default();
        let render = RenderSettings {
            timeout: Duration::from_secs(parse_env(
                "SHOPWATCH_RENDER_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
            settle: Duration::from_secs(parse_env(
                "SHOPWATCH_RENDER_SETTLE_SECS",
                defaults.settle.as_secs(),
            )),
            max_attempts: parse_env("SHOPWATCH_RENDER_MAX_ATTEMPTS", defaults.max_attempts).max(1),
        };

        Ok(Self {
            database_url,
            table_name,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 25),
            database_min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 2),
            database_connect_timeout_secs: parse_env("DATABASE_CONNECT_TIMEOUT_SECS", 5),
            shops_path: std::env::var("SHOPWATCH_SHOPS_PATH")
                .map_or_else(|_| PathBuf::from("./config/shops.toml"), PathBuf::from),
            max_workers: parse_env("SHOPWATCH_MAX_WORKERS", 3_usize).max(1),
            crawl_interval: Duration::from_secs(parse_env("SHOPWATCH_CRAWL_INTERVAL_SECS", 3600)),
            notify_interval: Duration::from_secs(parse_env("SHOPWATCH_NOTIFY_INTERVAL_SECS", 300)),
            retention_days: parse_env("SHOPWATCH_RETENTION_DAYS", 3),
            listen_addr,
            api_key: std::env::var("SHOPWATCH_API_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            http_timeout: Duration::from_secs(parse_env("SHOPWATCH_HTTP_TIMEOUT_SECS", 30)),
            user_agent: std::env::var("SHOPWATCH_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            render,
        })
    }

    /// Retention window as a chrono duration.
    #[must_use]
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}

/// Checks that `table` is a plain SQL identifier that can be interpolated
/// into statements: `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTableName`] otherwise.
pub fn validate_table_name(table: &str) -> Result<(), ConfigError> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && table.len() <= 63 {
        Ok(())
    } else {
        Err(ConfigError::InvalidTableName(table.to_string()))
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Like [`parse_env`], but a value that is present and invalid is an error.
fn parse_env_strict<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// How a shop's pages are retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopKind {
    /// Plain HTTP GET.
    Static,
    /// Headless browser render.
    Rendered,
}

impl FromStr for ShopKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "static" | "WebShopScraper" => Ok(Self::Static),
            "rendered" | "JavaScriptWebShopScraper" => Ok(Self::Rendered),
            other => Err(ConfigError::UnknownShopType(other.to_string())),
        }
    }
}

/// Shop entry as written in the TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawShop {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    urls: Vec<String>,
    item_selector: String,
    name_selector: String,
    #[serde(default)]
    price_selectors: Vec<String>,
    link_selector: String,
    #[serde(default)]
    next_page_selector: Option<String>,
    #[serde(default)]
    price_format: String,
    #[serde(default)]
    retry_marker: Option<String>,
    #[serde(default)]
    unique_parameters: Vec<String>,
    #[serde(default)]
    strip_fragment: bool,
    #[serde(default)]
    max_workers: Option<usize>,
    #[serde(default)]
    max_pages: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ShopsFile {
    #[serde(default)]
    shops: Vec<RawShop>,
}

/// CSS selectors used to pull listings out of a catalog page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    /// One match per product.
    pub item: String,
    /// Product name, relative to the item.
    pub name: String,
    /// Price nodes, relative to the item, tried in order.
    pub prices: Vec<String>,
    /// Anchor with the product link, relative to the item.
    pub link: String,
    /// Anchor pointing at the next catalog page.
    pub next_page: Option<String>,
}

/// Validated shop definition.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// Fetch variant.
    pub kind: ShopKind,
    /// Shop name, stored with every row.
    pub name: String,
    /// Catalog start URLs; each one is a crawl job.
    pub start_urls: Vec<Url>,
    /// Extraction selectors.
    pub selectors: Selectors,
    /// Price separator convention.
    pub price_format: PriceFormat,
    /// Substring marking an incomplete render.
    pub retry_marker: Option<String>,
    /// Query parameters stripped from every resolved link.
    pub unique_parameters: Vec<String>,
    /// Drop `#fragment` from resolved links.
    pub strip_fragment: bool,
    /// Per-shop override of the worker cap.
    pub max_workers: Option<usize>,
    /// Upper bound on pages per job.
    pub max_pages: Option<usize>,
}

impl ShopConfig {
    /// Effective worker cap given the service default.
    #[must_use]
    pub fn worker_limit(&self, default: usize) -> usize {
        self.max_workers.unwrap_or(default).max(1)
    }

    fn from_raw(raw: RawShop) -> Result<Self, ConfigError> {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::MissingField("shops[].name".to_string()));
        }

        let kind = raw.kind.parse::<ShopKind>()?;
        let price_format = raw.price_format.parse::<PriceFormat>()?;

        if raw.urls.is_empty() {
            return Err(ConfigError::MissingField(format!("{name}: urls")));
        }
        let start_urls = raw
            .urls
            .iter()
            .map(|u| {
                Url::parse(u.trim()).map_err(|e| ConfigError::InvalidUrl {
                    shop: name.clone(),
                    url: u.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (field, value) in [
            ("item_selector", &raw.item_selector),
            ("name_selector", &raw.name_selector),
            ("link_selector", &raw.link_selector),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(format!("{name}: {field}")));
            }
        }

        Ok(Self {
            kind,
            start_urls,
            selectors: Selectors {
                item: raw.item_selector,
                name: raw.name_selector,
                prices: raw.price_selectors,
                link: raw.link_selector,
                next_page: raw.next_page_selector.filter(|s| !s.trim().is_empty()),
            },
            price_format,
            retry_marker: raw.retry_marker.filter(|s| !s.is_empty()),
            unique_parameters: raw.unique_parameters,
            strip_fragment: raw.strip_fragment,
            max_workers: raw.max_workers,
            max_pages: raw.max_pages,
            name,
        })
    }
}

/// Parses and validates shop definitions from TOML text.
///
/// # Errors
///
/// Returns a [`ConfigError`] for malformed TOML, unknown shop types or
/// price formats, missing fields, or unparsable start URLs.
pub fn parse_shops(text: &str) -> Result<Vec<ShopConfig>, ConfigError> {
    let file: ShopsFile = toml::from_str(text)?;
    if file.shops.is_empty() {
        return Err(ConfigError::MissingField("shops".to_string()));
    }
    file.shops.into_iter().map(ShopConfig::from_raw).collect()
}

/// Reads and validates the shop definition file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, or any error
/// from [`parse_shops`].
pub fn load_shops(path: &Path) -> Result<Vec<ShopConfig>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_shops(&text)
}
