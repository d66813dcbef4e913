//! Technicals domain — point-in-time indicator snapshots from the scanner.
//!
//! Unlike the streaming side, this endpoint is request/response and its
//! client never fails: transport and decode problems become a snapshot with
//! `status: failed`, so callers can poll it in loops without error plumbing.

pub mod client;
pub mod wire;

pub use client::Technicals;
pub use wire::ScannerResponse;

use crate::shared::Timeframe;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every scanner field the crate knows about, used by
/// [`TechnicalsSelection::All`]. Names are the daily (suffix-free) forms.
pub const ALL_INDICATOR_FIELDS: &[&str] = &[
    "Recommend.All",
    "Recommend.MA",
    "Recommend.Other",
    "RSI",
    "RSI[1]",
    "Stoch.K",
    "Stoch.D",
    "Stoch.K[1]",
    "Stoch.D[1]",
    "CCI20",
    "CCI20[1]",
    "ADX",
    "ADX+DI",
    "ADX-DI",
    "ADX+DI[1]",
    "ADX-DI[1]",
    "AO",
    "AO[1]",
    "AO[2]",
    "Mom",
    "Mom[1]",
    "MACD.macd",
    "MACD.signal",
    "Stoch.RSI.K",
    "W.R",
    "BBPower",
    "UO",
    "EMA10",
    "SMA10",
    "EMA20",
    "SMA20",
    "EMA30",
    "SMA30",
    "EMA50",
    "SMA50",
    "EMA100",
    "SMA100",
    "EMA200",
    "SMA200",
    "Ichimoku.BLine",
    "VWMA",
    "HullMA9",
    "Pivot.M.Classic.S3",
    "Pivot.M.Classic.S2",
    "Pivot.M.Classic.S1",
    "Pivot.M.Classic.Middle",
    "Pivot.M.Classic.R1",
    "Pivot.M.Classic.R2",
    "Pivot.M.Classic.R3",
    "Pivot.M.Fibonacci.S3",
    "Pivot.M.Fibonacci.S2",
    "Pivot.M.Fibonacci.S1",
    "Pivot.M.Fibonacci.Middle",
    "Pivot.M.Fibonacci.R1",
    "Pivot.M.Fibonacci.R2",
    "Pivot.M.Fibonacci.R3",
    "close",
    "open",
    "high",
    "low",
    "volume",
    "change",
];

/// Which fields a scrape asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TechnicalsSelection {
    /// The full bundled field list.
    All,
    /// An explicit field name list (daily forms; the timeframe suffix is
    /// applied automatically).
    Named(Vec<String>),
}

impl TechnicalsSelection {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::All => ALL_INDICATOR_FIELDS.to_vec(),
            Self::Named(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Scrape outcome status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Success,
    Failed,
}

/// One scrape result. `data` is keyed by the suffix-free field name
/// regardless of timeframe.
#[derive(Debug, Clone, Serialize)]
pub struct TechnicalsSnapshot {
    pub status: ScrapeStatus,
    pub data: serde_json::Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TechnicalsSnapshot {
    pub fn is_success(&self) -> bool {
        self.status == ScrapeStatus::Success
    }

    pub(crate) fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: ScrapeStatus::Failed,
            data: serde_json::Map::new(),
            error: Some(reason.into()),
        }
    }
}

/// Suffixed request fields for a selection, e.g. `RSI` → `RSI|60` hourly.
pub(crate) fn request_fields(names: &[&str], timeframe: Timeframe) -> Vec<String> {
    names
        .iter()
        .map(|n| format!("{}{}", n, timeframe.field_suffix()))
        .collect()
}

/// Map a scanner response back onto suffix-free names. Fields the scanner
/// omitted are absent from `data`.
pub(crate) fn snapshot_from_response(
    names: &[&str],
    fields: &[String],
    resp: &ScannerResponse,
) -> TechnicalsSnapshot {
    let mut data = serde_json::Map::new();
    for (name, field) in names.iter().zip(fields) {
        if let Some(value) = resp.0.get(field) {
            data.insert((*name).to_string(), value.clone());
        }
    }
    TechnicalsSnapshot {
        status: ScrapeStatus::Success,
        data,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_fields_suffix() {
        let fields = request_fields(&["RSI", "Stoch.K"], Timeframe::Hour1);
        assert_eq!(fields, vec!["RSI|60", "Stoch.K|60"]);
        let daily = request_fields(&["RSI"], Timeframe::Day1);
        assert_eq!(daily, vec!["RSI"]);
    }

    #[test]
    fn test_snapshot_strips_suffix() {
        let resp: ScannerResponse =
            serde_json::from_str(r#"{"RSI|60": 63.5, "Stoch.K|60": 80.1}"#).unwrap();
        let names = ["RSI", "Stoch.K", "UO"];
        let fields = request_fields(&names, Timeframe::Hour1);
        let snap = snapshot_from_response(&names, &fields, &resp);
        assert!(snap.is_success());
        assert_eq!(snap.data["RSI"], 63.5);
        assert_eq!(snap.data["Stoch.K"], 80.1);
        // The scanner omitted UO; it stays absent rather than null.
        assert!(!snap.data.contains_key("UO"));
    }

    #[test]
    fn test_snapshot_serializes_like_an_export() {
        let snap = TechnicalsSnapshot::failed("connection refused");
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "connection refused");
    }

    #[test]
    fn test_selection_names() {
        assert!(TechnicalsSelection::All.names().len() > 50);
        let named = TechnicalsSelection::Named(vec!["RSI".to_string()]);
        assert_eq!(named.names(), vec!["RSI"]);
    }
}
