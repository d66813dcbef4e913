//! Network URL constants for the Chartfeed SDK.

/// Default data WebSocket URL.
pub const DEFAULT_WS_URL: &str = "wss://data.chartfeed.io/socket.io/websocket";

/// Default indicator metadata service base URL.
pub const DEFAULT_INDICATOR_URL: &str = "https://indicators.chartfeed.io";

/// Default scanner (technicals) base URL.
pub const DEFAULT_SCANNER_URL: &str = "https://scanner.chartfeed.io";

/// Origin header sent on WebSocket upgrade; the data host rejects
/// connections without a platform origin.
pub const WS_ORIGIN: &str = "https://www.chartfeed.io";
