//! Unified SDK error types.

use thiserror::Error;

pub use crate::shared::{InvalidSymbolFormat, InvalidTimeframe};

/// Top-level SDK error.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),

    #[error("Indicator error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("{0}")]
    Symbol(#[from] InvalidSymbolFormat),

    #[error("{0}")]
    Timeframe(#[from] InvalidTimeframe),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// HTTP-layer errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Timeout")]
    Timeout,

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// WebSocket errors.
#[derive(Error, Debug)]
pub enum WsError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Connection closed: code={code:?} reason={reason}")]
    Closed {
        code: Option<u16>,
        reason: String,
    },

    #[error("Reconnect retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Indicator resolution errors.
///
/// `NotFound` and `MetadataIncomplete` are deliberately distinct: the first
/// means the id/version pair does not exist on the metadata service, the
/// second means it exists but its descriptor cannot drive a study session.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Indicator {id} version {version} not found")]
    NotFound { id: String, version: String },

    #[error("Indicator {id} metadata incomplete: missing {missing}")]
    MetadataIncomplete { id: String, missing: String },

    #[error("Metadata service unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },
}
