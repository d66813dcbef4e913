//! Wire types for chart series (`du` / `timescale_update`) payloads.
//!
//! A series payload maps series and study ids to row buckets:
//! `{"sds_1": {"s": [{"i": 0, "v": [time, o, h, l, c, vol]}]}}`.

use crate::shared::serde_util;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One indexed row. `v[0]` is the bar time in epoch seconds; the remaining
/// values depend on the producer (OHLCV for series, plot values for studies).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeriesRow {
    pub i: i64,
    #[serde(default)]
    pub v: Vec<f64>,
}

/// Rows bucket under one series or study key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesBucket {
    /// Chart series rows (`"s"`).
    #[serde(rename = "s", default)]
    pub series: Vec<SeriesRow>,
    /// Study plot rows (`"st"`).
    #[serde(rename = "st", default)]
    pub study: Vec<SeriesRow>,
    /// Last-bar status, present on incremental updates.
    #[serde(rename = "lbs", default)]
    pub last_bar: Option<LastBarStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastBarStatus {
    #[serde(deserialize_with = "serde_util::timestamp_secs::deserialize")]
    pub bar_close_time: DateTime<Utc>,
}
