//! Error taxonomy for crawling, normalization, storage, and the HTTP API.
//!
//! Component errors ([`FetchError`], [`PriceError`], [`ResolveError`],
//! [`ConfigError`]) stay close to the layer that raises them and are
//! absorbed where the crawl decides to skip an item, a page, or a job.
//! [`ShopwatchError`] is the central service error; each variant maps to
//! a numeric code and an HTTP status for the listing API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "persistence error: connection refused"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Failure to retrieve page content for a URL.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network or protocol failure.
    #[error("transport error fetching {url}: {reason}")]
    Transport {
        /// URL being fetched.
        url: String,
        /// Underlying error message.
        reason: String,
    },

    /// Server answered with a non-success status.
    #[error("failed to fetch {url}: status code {status}")]
    Status {
        /// URL being fetched.
        url: String,
        /// HTTP status code returned.
        status: u16,
    },

    /// Rendering did not finish within the timeout on every attempt.
    #[error("rendering {url} timed out after {attempts} attempts")]
    Timeout {
        /// URL being rendered.
        url: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Rendered content still contained the shop's retry marker.
    #[error("data did not load correctly on {url} after {attempts} attempts")]
    RenderIncomplete {
        /// URL being rendered.
        url: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Headless browser failure other than a timeout.
    #[error("browser error rendering {url}: {reason}")]
    Browser {
        /// URL being rendered.
        url: String,
        /// Underlying error message.
        reason: String,
    },
}

impl FetchError {
    /// Returns `true` for failures a rendered fetch may retry while
    /// attempts remain. Static fetches never retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::RenderIncomplete { .. })
    }
}

/// Failure to turn price text into an integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// Cleaned text is not a valid integer.
    #[error("unable to parse price from {raw:?} (cleaned {cleaned:?})")]
    Unparseable {
        /// Text as found on the page.
        raw: String,
        /// Text after normalization.
        cleaned: String,
    },

    /// No candidate produced a price.
    #[error("no price found")]
    NoPrice,
}

/// Failure to resolve a discovered link into an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The link or the page URL could not be parsed.
    #[error("malformed url {link:?}: {reason}")]
    Malformed {
        /// The offending link or page URL.
        link: String,
        /// Parser message.
        reason: String,
    },
}

/// Configuration problems. Always fatal at startup, before crawling.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Shop `type` is not one of the supported fetch variants.
    #[error("unknown shop type '{0}'")]
    UnknownShopType(String),

    /// Price format is not one of the supported conventions.
    #[error("unknown price format '{0}'")]
    UnknownPriceFormat(String),

    /// A required setting is absent or empty.
    #[error("missing required setting: {0}")]
    MissingField(String),

    /// A CSS selector failed to compile.
    #[error("invalid selector {selector:?} for shop {shop}: {reason}")]
    InvalidSelector {
        /// Shop the selector belongs to.
        shop: String,
        /// Selector text.
        selector: String,
        /// Parser message.
        reason: String,
    },

    /// A start URL is not an absolute URL.
    #[error("invalid start url {url:?} for shop {shop}: {reason}")]
    InvalidUrl {
        /// Shop the URL belongs to.
        shop: String,
        /// URL text.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Table name is not a plain SQL identifier.
    #[error("invalid table name '{0}'")]
    InvalidTableName(String),

    /// An environment value could not be parsed.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Environment variable name.
        key: String,
        /// Parser message.
        reason: String,
    },

    /// Shop definition file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Shop definition file is not valid TOML for the expected shape.
    #[error("failed to parse shop definitions: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Central service error with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category      | HTTP Status               |
/// |-----------|---------------|---------------------------|
/// | 1000–1999 | Validation    | 400 Bad Request           |
/// | 2000–2999 | Access        | 401 Unauthorized          |
/// | 3000–3999 | Server        | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum ShopwatchError {
    /// Configuration failure.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Page content could not be parsed by the extractor.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Request lacked a valid API key.
    #[error("unauthorized")]
    Unauthorized,

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Notification delivery failed.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShopwatchError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Configuration(_) => 1001,
            Self::Extraction(_) => 1002,
            Self::Unauthorized => 2001,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::Delivery(_) => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration(_) | Self::Extraction(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PersistenceError(_) | Self::Delivery(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for ShopwatchError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for ShopwatchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Database details stay in the logs.
        let message = match &self {
            Self::PersistenceError(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message,
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_fetch_errors() {
        let timeout = FetchError::Timeout {
            url: "https://shop.test".to_string(),
            attempts: 5,
        };
        let status = FetchError::Status {
            url: "https://shop.test".to_string(),
            status: 503,
        };
        assert!(timeout.is_retryable());
        assert!(!status.is_retryable());
    }

    #[test]
    fn status_codes_follow_ranges() {
        assert_eq!(
            ShopwatchError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ShopwatchError::PersistenceError("down".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ShopwatchError::Configuration(ConfigError::MissingField("x".to_string())).error_code(),
            1001
        );
    }

    #[test]
    fn persistence_errors_hide_details_in_response() {
        let response = ShopwatchError::PersistenceError("password=secret".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
