//! WebSocket layer — framing, protocol messages, sessions, connection task.
//!
//! The platform multiplexes logical sessions over one socket using
//! `~m~<len>~m~` framed JSON commands. [`frame`] handles the framing,
//! [`message`] classifies inbound bodies, [`session`] tracks the logical
//! sessions, and [`conn`] owns the socket in a background tokio task driven
//! through [`StreamHandle`].

pub mod conn;
pub mod frame;
pub mod message;
pub mod session;

use serde_json::Value;

pub use conn::StreamHandle;
pub use session::{Session, SessionId, SessionKind, SessionSpec, SessionState, SessionTable};

// ─── Connection state ────────────────────────────────────────────────────────

/// Connection state, shared between the handle and the connection task via
/// an atomic. Numbering follows the browser WebSocket convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl From<u16> for ReadyState {
    fn from(value: u16) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Configuration for the streaming connection.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    /// Token for `set_auth_token`. The default grants public delayed data.
    pub auth_token: String,
    /// Language and region for `set_locale`.
    pub locale: (String, String),
    /// Timezone applied to every chart session via `switch_timezone`.
    pub timezone: String,
    /// Reconnect automatically when the connection drops.
    pub reconnect: bool,
    /// Reconnect attempt limit; 0 retries forever.
    pub max_reconnect_attempts: u32,
    pub base_reconnect_delay_ms: u32,
    pub max_reconnect_delay_ms: u32,
    /// The connection counts as dead after this long without any server frame.
    pub heartbeat_timeout_ms: u64,
    /// Sessions still unacked after this window are accepted unconfirmed.
    pub ack_timeout_ms: u64,
    /// Bounded packet channel capacity; a full channel blocks the socket
    /// reader rather than dropping packets.
    pub packet_buffer: usize,
    /// Bars requested when a chart series is created.
    pub bar_count: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: crate::network::DEFAULT_WS_URL.to_string(),
            auth_token: "unauthorized_user_token".to_string(),
            locale: ("en".to_string(), "US".to_string()),
            timezone: "Etc/UTC".to_string(),
            reconnect: true,
            max_reconnect_attempts: 0,
            base_reconnect_delay_ms: 500,
            max_reconnect_delay_ms: 60_000,
            heartbeat_timeout_ms: 30_000,
            ack_timeout_ms: 5_000,
            packet_buffer: 256,
            bar_count: 300,
        }
    }
}

// ─── Protocol commands ───────────────────────────────────────────────────────

/// Encode one client command as a framed `{"m": method, "p": params}` body.
pub(crate) fn encode_command(method: &str, params: &[Value]) -> String {
    let body = serde_json::json!({ "m": method, "p": params });
    frame::encode(&body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_command_is_framed_json() {
        let framed = encode_command("set_auth_token", &[json!("unauthorized_user_token")]);
        assert!(framed.starts_with("~m~"));

        let mut decoder = frame::FrameDecoder::new();
        let frames = decoder.feed(&framed).unwrap();
        assert_eq!(frames.len(), 1);
        let frame::Frame::Message(body) = &frames[0] else {
            panic!("expected a message frame");
        };
        let value: Value = serde_json::from_str(body).unwrap();
        assert_eq!(value["m"], "set_auth_token");
        assert_eq!(value["p"][0], "unauthorized_user_token");
    }

    #[test]
    fn test_ready_state_from_atomic_value() {
        assert_eq!(ReadyState::from(ReadyState::Open as u16), ReadyState::Open);
        assert_eq!(ReadyState::from(1), ReadyState::Open);
        // Anything out of range degrades to Closed.
        assert_eq!(ReadyState::from(99), ReadyState::Closed);
    }

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert!(config.reconnect);
        assert_eq!(config.max_reconnect_attempts, 0);
        assert!(config.packet_buffer > 0);
        assert_eq!(config.url, crate::network::DEFAULT_WS_URL);
    }
}
