//! Chart domain — OHLCV candle series.

pub mod wire;

pub use wire::{LastBarStatus, SeriesBucket, SeriesRow};

use crate::error::SdkError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One candle decoded from a series row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<Decimal>,
}

impl OhlcBar {
    /// Decode a `[time, open, high, low, close, volume?]` row.
    pub fn from_row(row: &SeriesRow) -> Result<Self, SdkError> {
        if row.v.len() < 5 {
            return Err(SdkError::Validation(format!(
                "series row {} has {} values, expected at least 5",
                row.i,
                row.v.len()
            )));
        }
        let time = DateTime::<Utc>::from_timestamp_millis((row.v[0] * 1000.0) as i64)
            .ok_or_else(|| {
                SdkError::Validation(format!("series row {} has invalid time {}", row.i, row.v[0]))
            })?;
        Ok(Self {
            time,
            open: decimal_from(row.v[1], row.i)?,
            high: decimal_from(row.v[2], row.i)?,
            low: decimal_from(row.v[3], row.i)?,
            close: decimal_from(row.v[4], row.i)?,
            volume: match row.v.get(5) {
                Some(v) => Some(decimal_from(*v, row.i)?),
                None => None,
            },
        })
    }
}

fn decimal_from(value: f64, row: i64) -> Result<Decimal, SdkError> {
    Decimal::try_from(value).map_err(|e| {
        SdkError::Validation(format!("series row {} has bad price {}: {}", row, value, e))
    })
}

/// Decode every candle in a `du`/`timescale_update` payload, ordered by bar
/// index. Non-bucket entries are skipped; a bucket row that cannot form a
/// candle is an error.
pub fn bars_from_payload(payload: &Value) -> Result<Vec<OhlcBar>, SdkError> {
    let Some(object) = payload.as_object() else {
        return Ok(Vec::new());
    };

    let mut rows: Vec<SeriesRow> = Vec::new();
    for entry in object.values() {
        let Ok(bucket) = serde_json::from_value::<SeriesBucket>(entry.clone()) else {
            continue;
        };
        rows.extend(bucket.series);
    }
    rows.sort_by_key(|r| r.i);

    rows.iter().map(OhlcBar::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bars_from_payload_ordered_by_index() {
        let payload = serde_json::json!({
            "sds_1": {"s": [
                {"i": 1, "v": [1700000060.0, 101.0, 102.0, 100.5, 101.5, 20.0]},
                {"i": 0, "v": [1700000000.0, 100.0, 101.5, 99.5, 101.0, 10.0]}
            ]}
        });
        let bars = bars_from_payload(&payload).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].time.timestamp(), 1_700_000_000);
        assert_eq!(bars[1].time.timestamp(), 1_700_000_060);
        assert_eq!(bars[0].close, Decimal::try_from(101.0).unwrap());
        assert_eq!(bars[1].volume, Some(Decimal::try_from(20.0).unwrap()));
    }

    #[test]
    fn test_bar_without_volume() {
        let row = SeriesRow {
            i: 0,
            v: vec![1700000000.0, 1.0, 2.0, 0.5, 1.5],
        };
        let bar = OhlcBar::from_row(&row).unwrap();
        assert_eq!(bar.volume, None);
    }

    #[test]
    fn test_short_row_is_error() {
        let row = SeriesRow {
            i: 7,
            v: vec![1700000000.0, 1.0],
        };
        assert!(matches!(
            OhlcBar::from_row(&row),
            Err(SdkError::Validation(_))
        ));
    }

    #[test]
    fn test_non_bucket_entries_skipped() {
        let payload = serde_json::json!({
            "sds_1": {"s": [{"i": 0, "v": [1700000000.0, 1.0, 2.0, 0.5, 1.5]}]},
            "noise": 42
        });
        let bars = bars_from_payload(&payload).unwrap();
        assert_eq!(bars.len(), 1);
    }
}
