//! Shared newtypes and utilities used across all domain modules.
//!
//! These types are serialization-transparent: they serialize/deserialize identically
//! to the raw format the platform sends, so they can be used directly in wire types
//! without conversion overhead.

pub mod serde_util;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use thiserror::Error;

// ─── Symbol ──────────────────────────────────────────────────────────────────

/// Error returned when a symbol string is not `EXCHANGE:TICKER`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid symbol '{0}': expected EXCHANGE:TICKER (e.g. \"BINANCE:BTCUSDT\")")]
pub struct InvalidSymbolFormat(pub String);

/// A fully-qualified instrument symbol, e.g. `"BINANCE:BTCUSDT"`.
///
/// The platform only accepts exchange-prefixed symbols; a bare ticker like
/// `"BTCUSDT"` is rejected at parse time, before any network traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(String);

impl Symbol {
    /// Builds a symbol from its exchange and ticker parts.
    pub fn new(exchange: impl AsRef<str>, ticker: impl AsRef<str>) -> Self {
        Self(format!("{}:{}", exchange.as_ref(), ticker.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The exchange part, e.g. `"BINANCE"`.
    pub fn exchange(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }

    /// The ticker part, e.g. `"BTCUSDT"`.
    pub fn ticker(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or("")
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = InvalidSymbolFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((exchange, ticker))
                if !exchange.is_empty() && !ticker.is_empty() && !ticker.contains(':') =>
            {
                Ok(Symbol(s.to_string()))
            }
            _ => Err(InvalidSymbolFormat(s.to_string())),
        }
    }
}

impl Serialize for Symbol {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Symbol::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ─── Timeframe ───────────────────────────────────────────────────────────────

/// Error returned for a timeframe string outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported timeframe '{0}' (valid: 1m 5m 15m 30m 1h 2h 4h 1d 1W 1M)")]
pub struct InvalidTimeframe(pub String);

/// Candle timeframe for chart series and technicals snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "2h")]
    Hour2,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1W")]
    Week1,
    #[serde(rename = "1M")]
    Month1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute1 => "1m",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Minute30 => "30m",
            Self::Hour1 => "1h",
            Self::Hour2 => "2h",
            Self::Hour4 => "4h",
            Self::Day1 => "1d",
            Self::Week1 => "1W",
            Self::Month1 => "1M",
        }
    }

    /// Interval string used by `create_series` on the socket (minutes, or a
    /// letter code for day and above).
    pub fn series_interval(&self) -> &'static str {
        match self {
            Self::Minute1 => "1",
            Self::Minute5 => "5",
            Self::Minute15 => "15",
            Self::Minute30 => "30",
            Self::Hour1 => "60",
            Self::Hour2 => "120",
            Self::Hour4 => "240",
            Self::Day1 => "1D",
            Self::Week1 => "1W",
            Self::Month1 => "1M",
        }
    }

    /// Suffix appended to scanner field names, e.g. `RSI|60` for hourly.
    /// Daily fields carry no suffix.
    pub fn field_suffix(&self) -> &'static str {
        match self {
            Self::Minute1 => "|1",
            Self::Minute5 => "|5",
            Self::Minute15 => "|15",
            Self::Minute30 => "|30",
            Self::Hour1 => "|60",
            Self::Hour2 => "|120",
            Self::Hour4 => "|240",
            Self::Day1 => "",
            Self::Week1 => "|1W",
            Self::Month1 => "|1M",
        }
    }
}

impl FromStr for Timeframe {
    type Err = InvalidTimeframe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::Minute1),
            "5m" => Ok(Self::Minute5),
            "15m" => Ok(Self::Minute15),
            "30m" => Ok(Self::Minute30),
            "1h" => Ok(Self::Hour1),
            "2h" => Ok(Self::Hour2),
            "4h" => Ok(Self::Hour4),
            "1d" => Ok(Self::Day1),
            "1W" => Ok(Self::Week1),
            "1M" => Ok(Self::Month1),
            _ => Err(InvalidTimeframe(s.to_string())),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_parse_valid() {
        let sym: Symbol = "BINANCE:BTCUSDT".parse().unwrap();
        assert_eq!(sym.exchange(), "BINANCE");
        assert_eq!(sym.ticker(), "BTCUSDT");
        assert_eq!(sym.as_str(), "BINANCE:BTCUSDT");
    }

    #[test]
    fn test_symbol_parse_rejects_bare_ticker() {
        assert!("BTCUSDT".parse::<Symbol>().is_err());
        assert!(":BTCUSDT".parse::<Symbol>().is_err());
        assert!("BINANCE:".parse::<Symbol>().is_err());
        assert!("".parse::<Symbol>().is_err());
        assert!("A:B:C".parse::<Symbol>().is_err());
    }

    #[test]
    fn test_symbol_serde() {
        let sym = Symbol::new("NASDAQ", "AAPL");
        let json = serde_json::to_string(&sym).unwrap();
        assert_eq!(json, "\"NASDAQ:AAPL\"");
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(sym, back);
        assert!(serde_json::from_str::<Symbol>("\"AAPL\"").is_err());
    }

    #[test]
    fn test_timeframe_parse() {
        let tf: Timeframe = "1h".parse().unwrap();
        assert_eq!(tf, Timeframe::Hour1);
        assert_eq!(tf.series_interval(), "60");
        assert_eq!(tf.field_suffix(), "|60");
        assert!("7m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_timeframe_daily_has_no_suffix() {
        assert_eq!(Timeframe::Day1.field_suffix(), "");
        assert_eq!(Timeframe::Day1.series_interval(), "1D");
    }

    #[test]
    fn test_timeframe_serde() {
        let tf: Timeframe = serde_json::from_str("\"1W\"").unwrap();
        assert_eq!(tf, Timeframe::Week1);
        assert_eq!(serde_json::to_string(&Timeframe::Minute5).unwrap(), "\"5m\"");
    }
}
