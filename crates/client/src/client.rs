use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, RETRY_AFTER};
use serde::Deserialize;
use serde_json::Value;
use temba_migrate_core::{API_PATH_PREFIX, Cursor, EntityType, MAX_RETRY_AFTER_SECS, SourceRecord};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Longest single backoff pause between transient retries.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// One page of decoded records plus the cursor of the following page.
#[derive(Debug)]
pub struct Page {
    pub records: Vec<SourceRecord>,
    /// `None` once the last page has been returned.
    pub next: Option<Cursor>,
}

#[derive(Deserialize)]
struct RawPage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<Value>,
}

/// Client for the source instance's API.
pub struct ApiClient {
    client: reqwest::Client,
    config: ClientConfig,
    last_request: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("config", &self.config).finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client for the configured instance.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::ClientInit(e.to_string()))?;
        Ok(Self { client, config, last_request: Mutex::new(None) })
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the first-page URL of an entity's resource.
    pub fn resource_url(&self, entity: EntityType) -> Result<String, ClientError> {
        let resource = entity.resource().ok_or(ClientError::NoResource(entity.as_str()))?;
        Ok(format!("{}{API_PATH_PREFIX}/{resource}.json", self.config.base_url))
    }

    /// Fetch one page of `entity` records. `cursor` is `None` for the first page.
    ///
    /// Pages come back in the API's native order.
    ///
    /// # Errors
    /// Returns an error when retries are exhausted, on a non-retryable HTTP
    /// status, on an unparseable body or when a record lacks its id.
    pub async fn fetch(
        &self,
        entity: EntityType,
        cursor: Option<&Cursor>,
    ) -> Result<Page, ClientError> {
        let url = match cursor {
            Some(cursor) => cursor.as_str().to_owned(),
            None => self.resource_url(entity)?,
        };
        let body = self.get_json(&url).await?;
        let raw: RawPage = serde_json::from_value(body).map_err(|e| ClientError::JsonParse {
            context: format!("{entity} page at {url}"),
            source: e,
        })?;

        let records = raw
            .results
            .into_iter()
            .map(|value| SourceRecord::from_json(entity, value))
            .collect::<Result<Vec<_>, _>>()?;
        let next = raw.next.filter(|n| !n.trim().is_empty()).map(Cursor::new);
        tracing::debug!(%entity, records = records.len(), has_next = next.is_some(), "fetched page");
        Ok(Page { records, next })
    }

    /// Fetch the source organization, which is a single object rather than a page.
    ///
    /// # Errors
    /// Same failure modes as [`ApiClient::fetch`].
    pub async fn fetch_org(&self) -> Result<SourceRecord, ClientError> {
        let url = self.resource_url(EntityType::Org)?;
        let body = self.get_json(&url).await?;
        Ok(SourceRecord::from_json(EntityType::Org, body)?)
    }

    async fn get_json(&self, url: &str) -> Result<Value, ClientError> {
        let mut transient_failures: u32 = 0;
        let mut rate_limit_waits: u32 = 0;

        loop {
            self.throttle().await;

            let err = match self.try_get_json(url).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let delay = if let ClientError::RateLimited { retry_after } = &err {
                let retry_after = *retry_after;
                rate_limit_waits = rate_limit_waits.saturating_add(1);
                if self.config.max_rate_limit_waits.is_some_and(|max| rate_limit_waits > max) {
                    return Err(ClientError::RetriesExhausted(Box::new(err)));
                }
                retry_after.unwrap_or_else(|| self.backoff(rate_limit_waits))
            } else if err.is_transient() {
                transient_failures = transient_failures.saturating_add(1);
                if transient_failures > self.config.max_retries {
                    return Err(ClientError::RetriesExhausted(Box::new(err)));
                }
                self.backoff(transient_failures)
            } else {
                return Err(err);
            };

            tracing::warn!(
                url,
                transient_failures,
                rate_limit_waits,
                "source API retry after {delay:?}: {err}"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn try_get_json(&self, url: &str) -> Result<Value, ClientError> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Token {}", self.config.api_key))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str(&body).map_err(|e| ClientError::JsonParse {
                context: format!("response from {url} (body: {})", truncate(&body, 200)),
                source: e,
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)));
            return Err(ClientError::RateLimited { retry_after });
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_else(|_| "Could not read error body".to_owned());
        let body = truncate(&body, 500).to_owned();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(ClientError::Authentication { code, body });
        }
        Err(ClientError::HttpStatus { code, body })
    }

    /// Blocks until the configured interval has passed since the previous request.
    async fn throttle(&self) {
        let throttle = self.config.throttle;
        if !throttle.is_zero() {
            let wait = self
                .last_request
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .map(|last| throttle.saturating_sub(last.elapsed()));
            if let Some(wait) = wait.filter(|w| !w.is_zero()) {
                tracing::debug!("throttling source API for {wait:?}");
                tokio::time::sleep(wait).await;
            }
        }
        *self.last_request.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(6);
        self.config.backoff_base.saturating_mul(1_u32 << exponent).min(MAX_BACKOFF)
    }
}

/// Truncates a string to the given maximum length at a char boundary.
#[must_use]
pub(crate) fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        s.get(..end).unwrap_or("")
    }
}
