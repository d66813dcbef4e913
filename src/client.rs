//! High-level client — `ChartfeedClient` with nested sub-client accessors.
//!
//! Each domain has its own sub-client in `domain/<name>/client.rs`.
//! This module keeps the builder, shared cache state, and accessor methods.

use crate::domain::indicator::{IndicatorMetadata, Indicators};
use crate::domain::technicals::Technicals;
use crate::http::ChartfeedHttp;
use crate::stream::Streamer;
use crate::ws::StreamConfig;

use async_lock::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

// Re-export sub-client types for convenience.
pub use crate::domain::indicator::Indicators as IndicatorsClient;
pub use crate::domain::technicals::Technicals as TechnicalsClient;

/// The primary entry point for the SDK.
///
/// Provides nested sub-client accessors for each domain:
/// `client.indicators()`, `client.technicals()`, `client.streamer()`.
pub struct ChartfeedClient {
    pub(crate) http: ChartfeedHttp,
    pub(crate) stream_config: StreamConfig,
    /// Indicator metadata cache: (id, version) → metadata.
    pub(crate) indicator_cache: Arc<RwLock<HashMap<(String, String), IndicatorMetadata>>>,
}

impl ChartfeedClient {
    pub fn builder() -> ChartfeedClientBuilder {
        ChartfeedClientBuilder::default()
    }

    // ── Sub-client accessors ─────────────────────────────────────────────

    pub fn indicators(&self) -> Indicators<'_> {
        Indicators { client: self }
    }

    pub fn technicals(&self) -> Technicals<'_> {
        Technicals { client: self }
    }

    pub fn streamer(&self) -> Streamer<'_> {
        Streamer { client: self }
    }

    /// Config used for every connection opened through [`Self::streamer`].
    ///
    /// The connection itself is intentionally not embedded in
    /// `ChartfeedClient`; stream lifetimes are managed by the caller through
    /// [`crate::stream::PacketStream`].
    pub fn stream_config(&self) -> &StreamConfig {
        &self.stream_config
    }

    /// Set or clear the platform session cookie used for private-indicator
    /// metadata lookups.
    pub async fn set_session_cookie(&self, cookie: Option<String>) {
        self.http.set_session_cookie(cookie).await;
    }
}

impl Clone for ChartfeedClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            stream_config: self.stream_config.clone(),
            indicator_cache: self.indicator_cache.clone(),
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct ChartfeedClientBuilder {
    indicator_url: String,
    scanner_url: String,
    stream_config: StreamConfig,
    session_cookie: Option<String>,
}

impl Default for ChartfeedClientBuilder {
    fn default() -> Self {
        Self {
            indicator_url: crate::network::DEFAULT_INDICATOR_URL.to_string(),
            scanner_url: crate::network::DEFAULT_SCANNER_URL.to_string(),
            stream_config: StreamConfig::default(),
            session_cookie: None,
        }
    }
}

impl ChartfeedClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indicator_url(mut self, url: &str) -> Self {
        self.indicator_url = url.to_string();
        self
    }

    pub fn scanner_url(mut self, url: &str) -> Self {
        self.scanner_url = url.to_string();
        self
    }

    pub fn ws_url(mut self, url: &str) -> Self {
        self.stream_config.url = url.to_string();
        self
    }

    /// Auth token announced on every connection. Defaults to the anonymous
    /// token, which streams delayed data.
    pub fn auth_token(mut self, token: &str) -> Self {
        self.stream_config.auth_token = token.to_string();
        self
    }

    /// Platform session cookie, required only for private indicators.
    pub fn session_cookie(mut self, cookie: &str) -> Self {
        self.session_cookie = Some(cookie.to_string());
        self
    }

    /// Replace the whole stream config. Overrides earlier `ws_url` and
    /// `auth_token` calls.
    pub fn stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    pub fn build(self) -> ChartfeedClient {
        ChartfeedClient {
            http: ChartfeedHttp::new(&self.indicator_url, &self.scanner_url)
                .with_session_cookie(self.session_cookie),
            stream_config: self.stream_config,
            indicator_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}
