//! Low-level HTTP client — `ChartfeedHttp`.
//!
//! One method per platform endpoint. Returns wire types (conversion to domain
//! types happens at the sub-client boundary). Internal to the SDK.

use crate::domain::indicator::wire::TranslateResponse;
use crate::domain::technicals::wire::ScannerResponse;
use crate::error::HttpError;
use crate::http::retry::{RetryConfig, RetryPolicy};

use async_lock::RwLock;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing;

/// Low-level HTTP client for the platform's metadata and scanner services.
pub struct ChartfeedHttp {
    indicator_url: String,
    scanner_url: String,
    client: Client,
    /// Platform session cookie, required only for private indicators.
    /// NEVER exposed publicly.
    session_cookie: Arc<RwLock<Option<String>>>,
}

impl ChartfeedHttp {
    pub fn new(indicator_url: &str, scanner_url: &str) -> Self {
        let builder = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10);

        Self {
            indicator_url: indicator_url.trim_end_matches('/').to_string(),
            scanner_url: scanner_url.trim_end_matches('/').to_string(),
            client: builder.build().expect("Failed to build HTTP client"),
            session_cookie: Arc::new(RwLock::new(None)),
        }
    }

    /// Seed the session cookie at construction time.
    pub(crate) fn with_session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = Arc::new(RwLock::new(cookie));
        self
    }

    /// Set the session cookie used for private-indicator metadata lookups.
    pub(crate) async fn set_session_cookie(&self, cookie: Option<String>) {
        *self.session_cookie.write().await = cookie;
    }

    // ── Indicator metadata ───────────────────────────────────────────────

    pub async fn get_indicator_translation(
        &self,
        id: &str,
        version: &str,
    ) -> Result<TranslateResponse, HttpError> {
        let url = format!(
            "{}/translate/{}/{}",
            self.indicator_url,
            urlencoding::encode(id),
            urlencoding::encode(version)
        );
        self.get(&url, RetryPolicy::Idempotent).await
    }

    // ── Scanner ──────────────────────────────────────────────────────────

    pub async fn get_scanner_snapshot(
        &self,
        symbol: &str,
        fields: &[String],
    ) -> Result<ScannerResponse, HttpError> {
        let url = format!(
            "{}/symbol?symbol={}&fields={}&no_404=true",
            self.scanner_url,
            urlencoding::encode(symbol),
            urlencoding::encode(&fields.join(","))
        );
        self.get(&url, RetryPolicy::None).await
    }

    // ── Internal HTTP methods ────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        retry: RetryPolicy,
    ) -> Result<T, HttpError> {
        self.request_with_retry(url, retry).await
    }

    async fn request_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
        retry: RetryPolicy,
    ) -> Result<T, HttpError> {
        let config = match &retry {
            RetryPolicy::None => {
                return self.do_request(url).await;
            }
            RetryPolicy::Idempotent => RetryConfig::idempotent(),
            RetryPolicy::Custom(c) => c.clone(),
        };

        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match self.do_request::<T>(url).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let should_retry = match &e {
                        HttpError::ServerError { status, .. } => {
                            config.retryable_statuses.contains(status)
                        }
                        HttpError::RateLimited { retry_after_ms } => {
                            if let Some(ms) = retry_after_ms {
                                let delay = Duration::from_millis(*ms);
                                futures_timer::Delay::new(delay).await;
                            }
                            true
                        }
                        HttpError::Timeout => true,
                        HttpError::Reqwest(re) => {
                            re.is_connect() || re.is_timeout() || re.is_request()
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(e);
                    }
                    last_error = Some(e);
                    if attempt < config.max_retries {
                        let delay = config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max = config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying request to {}",
                            url
                        );
                        futures_timer::Delay::new(delay).await;
                    }
                }
            }
        }

        Err(HttpError::MaxRetriesExceeded {
            attempts: config.max_retries + 1,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn do_request<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        let mut req = self.client.get(url);

        if let Some(cookie) = self.session_cookie.read().await.as_ref() {
            req = req.header("Cookie", format!("sessionid={}", cookie));
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status.is_success() {
            let parsed = resp.json::<T>().await?;
            return Ok(parsed);
        }

        let status_code = status.as_u16();
        let body_text = resp.text().await.unwrap_or_default();

        match status_code {
            401 => Err(HttpError::Unauthorized),
            404 => Err(HttpError::NotFound(body_text)),
            429 => Err(HttpError::RateLimited {
                retry_after_ms: None,
            }),
            400..=499 => Err(HttpError::BadRequest(body_text)),
            _ => Err(HttpError::ServerError {
                status: status_code,
                body: body_text,
            }),
        }
    }
}

impl Clone for ChartfeedHttp {
    fn clone(&self) -> Self {
        Self {
            indicator_url: self.indicator_url.clone(),
            scanner_url: self.scanner_url.clone(),
            client: self.client.clone(),
            session_cookie: self.session_cookie.clone(),
        }
    }
}
