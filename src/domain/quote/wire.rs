//! Wire types for quote session (`qsd`) payloads.

use crate::shared::serde_util;
use crate::shared::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-symbol load status inside a `qsd` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Ok,
    Error,
    #[serde(other)]
    Unknown,
}

/// One `qsd` payload: `{"n": symbol, "s": status, "v": {fields}}`.
///
/// Updates are partial; `values` only carries fields that changed since the
/// previous update for this symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteUpdate {
    #[serde(rename = "n")]
    pub symbol: Symbol,
    #[serde(rename = "s")]
    pub status: QuoteStatus,
    #[serde(rename = "v", default)]
    pub values: QuoteValues,
}

/// The field map of a quote update. Everything the default field set does
/// not model lands in `extra` untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteValues {
    /// Last trade price.
    #[serde(default)]
    pub lp: Option<Decimal>,
    /// Absolute change since the previous close.
    #[serde(default)]
    pub ch: Option<Decimal>,
    /// Percent change since the previous close.
    #[serde(default)]
    pub chp: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    /// Time of the last trade.
    #[serde(default, deserialize_with = "serde_util::timestamp_secs_opt::deserialize")]
    pub lp_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub current_session: Option<String>,
    #[serde(rename = "type", default)]
    pub instrument_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl QuoteUpdate {
    pub fn from_value(payload: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_update_parses_partial_fields() {
        let payload = serde_json::json!({
            "n": "BINANCE:BTCUSDT",
            "s": "ok",
            "v": {"lp": 65000.5, "chp": -1.25, "lp_time": 1700000000}
        });
        let update = QuoteUpdate::from_value(&payload).unwrap();
        assert_eq!(update.symbol.as_str(), "BINANCE:BTCUSDT");
        assert_eq!(update.status, QuoteStatus::Ok);
        assert_eq!(update.values.lp, Some(Decimal::try_from(65000.5).unwrap()));
        assert_eq!(update.values.chp, Some(Decimal::try_from(-1.25).unwrap()));
        assert_eq!(
            update.values.lp_time.unwrap().timestamp(),
            1_700_000_000
        );
        assert!(update.values.volume.is_none());
    }

    #[test]
    fn test_quote_update_keeps_unmodeled_fields() {
        let payload = serde_json::json!({
            "n": "NASDAQ:AAPL",
            "s": "ok",
            "v": {"pro_name": "NASDAQ:AAPL", "pricescale": 100}
        });
        let update = QuoteUpdate::from_value(&payload).unwrap();
        assert_eq!(update.values.extra["pro_name"], "NASDAQ:AAPL");
        assert_eq!(update.values.extra["pricescale"], 100);
    }

    #[test]
    fn test_quote_error_status() {
        let payload = serde_json::json!({"n": "NOPE:X", "s": "error", "v": {}});
        let update = QuoteUpdate::from_value(&payload).unwrap();
        assert_eq!(update.status, QuoteStatus::Error);
    }
}
