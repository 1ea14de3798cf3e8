//! Typed error enum for the API client.

use std::time::Duration;

use temba_migrate_core::ValidationError;
use thiserror::Error;

/// Errors from source API operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("HTTP status {code}: {body}")]
    HttpStatus { code: u16, body: String },
    #[error("rate limited by source API (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("authentication rejected with HTTP {code}: {body}")]
    Authentication { code: u16, body: String },
    #[error("JSON parse error in {context}: {source}")]
    JsonParse {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("entity type `{0}` has no API resource")]
    NoResource(&'static str),
    #[error("client initialization failed: {0}")]
    ClientInit(String),
    #[error("all retries exhausted, last error: {0}")]
    RetriesExhausted(Box<ClientError>),
}

impl ClientError {
    /// Whether this error is transient and should be retried.
    ///
    /// Rate limiting counts as transient but is retried on its own budget.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpRequest(e) => !e.is_builder(),
            Self::HttpStatus { code, .. } => matches!(code, 500..=599),
            Self::RateLimited { .. } => true,
            _ => false,
        }
    }
}
