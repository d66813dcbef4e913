//! # Chartfeed SDK
//!
//! A Rust SDK for the Chartfeed real-time market-data platform.
//!
//! ## Architecture
//!
//! The SDK is organized in layers:
//!
//! 1. **Core** — Shared newtypes, domain models, errors (no I/O)
//! 2. **HTTP API** — `ChartfeedHttp` with per-endpoint retry policies
//! 3. **WebSocket** — Framed protocol codec, session table, connection task
//! 4. **Streaming** — `Streamer` facade producing a `PacketStream`
//! 5. **High-Level Client** — `ChartfeedClient` with nested sub-clients and caching
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chartfeed::prelude::*;
//! use futures_util::StreamExt;
//!
//! let client = ChartfeedClient::builder().build();
//!
//! let spec = SubscriptionSpec::new("BINANCE:BTCUSDT")
//!     .timeframe(Timeframe::Minute5)
//!     .indicator(IndicatorSpec::with_version("STD;RSI", "last"));
//! let mut stream = client.streamer().stream(&[spec]).await?;
//!
//! while let Some(packet) = stream.next().await {
//!     if let Some(update) = packet?.as_quote() {
//!         println!("{} -> {:?}", update.symbol, update.values.lp);
//!     }
//! }
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes used across all domains.
pub mod shared;

/// Domain modules (vertical slices): types, wire types, conversions.
pub mod domain;

/// Unified SDK error types.
pub mod error;

/// Network URL constants.
pub mod network;

// ── Layer 2: HTTP API ────────────────────────────────────────────────────────

/// HTTP client with retry policies.
pub mod http;

// ── Layer 3: WebSocket ───────────────────────────────────────────────────────

/// WebSocket transport: frame codec, message router, sessions, connection.
pub mod ws;

// ── Layer 4: Streaming ───────────────────────────────────────────────────────

/// Streaming facade: subscriptions, packets, the packet stream.
pub mod stream;

// ── Layer 5: High-Level Client ───────────────────────────────────────────────

/// `ChartfeedClient` — the primary entry point.
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{Symbol, Timeframe};

    // Domain types — quote
    pub use crate::domain::quote::{QuoteStatus, QuoteUpdate, QuoteValues, DEFAULT_QUOTE_FIELDS};

    // Domain types — chart
    pub use crate::domain::chart::OhlcBar;

    // Domain types — indicator
    pub use crate::domain::indicator::{
        IndicatorMetadata, IndicatorSpec, StudyPoint, BUILTIN_INDICATORS,
    };

    // Domain types — technicals
    pub use crate::domain::technicals::{ScrapeStatus, TechnicalsSelection, TechnicalsSnapshot};

    // Errors
    pub use crate::error::{ResolveError, SdkError, WsError};

    // Network
    pub use crate::network::{DEFAULT_INDICATOR_URL, DEFAULT_SCANNER_URL, DEFAULT_WS_URL};

    // HTTP client + sub-clients
    pub use crate::client::{
        ChartfeedClient, ChartfeedClientBuilder, IndicatorsClient, TechnicalsClient,
    };
    pub use crate::http::retry::{RetryConfig, RetryPolicy};

    // Streaming
    pub use crate::stream::{Packet, PacketKind, PacketStream, Streamer, SubscriptionSpec};
    pub use crate::ws::{ReadyState, SessionId, StreamConfig, StreamHandle};
}
