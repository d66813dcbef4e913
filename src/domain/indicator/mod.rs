//! Indicator domain — metadata resolution for study sessions.
//!
//! A study session is only legal once its indicator id/version has been
//! resolved against the metadata service; the resolved descriptor carries
//! the compiled script the socket needs and the output fields consumers
//! read back.

pub mod client;
mod convert;
pub mod wire;

use crate::domain::chart::wire::{SeriesBucket, SeriesRow};
use crate::error::SdkError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use client::Indicators;
pub(crate) use convert::metadata_from_translate;

/// Built-in indicators used when a subscription asks for `all_indicators`.
/// Version `"last"` always resolves on the metadata service.
pub const BUILTIN_INDICATORS: &[(&str, &str)] = &[
    ("STD;RSI", "last"),
    ("STD;MACD", "last"),
    ("STD;Stochastic", "last"),
    ("STD;Bollinger_Bands", "last"),
    ("STD;Awesome_Oscillator", "last"),
    ("STD;Momentum", "last"),
    ("STD;Average_True_Range", "last"),
    ("STD;Supertrend", "last"),
];

/// Pinned version for a built-in indicator id, if it is one.
pub fn builtin_version(id: &str) -> Option<&'static str> {
    BUILTIN_INDICATORS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, v)| *v)
}

/// Caller-side indicator request: an id plus an optional version.
///
/// A spec without a pinned version is rejected before any I/O; the
/// `all_indicators` subscription flag is the way to get the built-in set,
/// whose versions come from [`BUILTIN_INDICATORS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl IndicatorSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
        }
    }

    pub fn with_version(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: Some(version.into()),
        }
    }
}

/// One declared input of an indicator script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorInput {
    pub id: String,
    pub name: Option<String>,
    pub input_type: Option<String>,
    pub default: Option<Value>,
    pub hidden: bool,
}

/// One output field an indicator publishes, with its display title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorOutput {
    pub field: String,
    pub title: String,
}

/// Resolved indicator descriptor. Immutable once fetched; cached for the
/// life of the process keyed by `(id, version)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorMetadata {
    pub id: String,
    pub version: String,
    pub inputs: Vec<IndicatorInput>,
    pub outputs: Vec<IndicatorOutput>,
    /// Compiled script payload, sent verbatim in `create_study`.
    pub script: String,
}

impl IndicatorMetadata {
    /// Input object for the `create_study` command: the compiled script,
    /// identity fields, and every declared `in_*` default.
    pub fn study_inputs(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("text".to_string(), Value::String(self.script.clone()));
        map.insert("pineId".to_string(), Value::String(self.id.clone()));
        map.insert(
            "pineVersion".to_string(),
            Value::String(self.version.clone()),
        );
        for input in &self.inputs {
            if !input.id.starts_with("in_") {
                continue;
            }
            let mut entry = serde_json::Map::new();
            entry.insert(
                "v".to_string(),
                input.default.clone().unwrap_or(Value::Null),
            );
            entry.insert("f".to_string(), Value::Bool(true));
            entry.insert(
                "t".to_string(),
                input
                    .input_type
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            );
            map.insert(input.id.clone(), Value::Object(entry));
        }
        Value::Object(map)
    }

    /// Output title for a plot field, when the descriptor declares it.
    pub fn output_title(&self, field: &str) -> Option<&str> {
        self.outputs
            .iter()
            .find(|o| o.field == field)
            .map(|o| o.title.as_str())
    }

    #[cfg(test)]
    pub(crate) fn test_fixture(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            inputs: vec![IndicatorInput {
                id: "in_0".to_string(),
                name: Some("Length".to_string()),
                input_type: Some("integer".to_string()),
                default: Some(serde_json::json!(14)),
                hidden: false,
            }],
            outputs: vec![IndicatorOutput {
                field: "plot_0".to_string(),
                title: "Value".to_string(),
            }],
            script: "Script@tv-scope".to_string(),
        }
    }
}

/// One computed indicator sample: bar time plus the script's plot values in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPoint {
    pub time: DateTime<Utc>,
    pub values: Vec<f64>,
}

impl StudyPoint {
    fn from_row(row: &SeriesRow) -> Result<Self, SdkError> {
        let Some(&time) = row.v.first() else {
            return Err(SdkError::Validation(format!(
                "study row {} is missing its timestamp",
                row.i
            )));
        };
        let time = DateTime::<Utc>::from_timestamp_millis((time * 1000.0) as i64)
            .ok_or_else(|| {
                SdkError::Validation(format!("study row {} has invalid time {}", row.i, time))
            })?;
        Ok(Self {
            time,
            values: row.v[1..].to_vec(),
        })
    }
}

/// Decode every study sample in a `study` payload, ordered by bar index.
/// Accepts both a bare rows bucket and a payload keyed by study id.
pub fn points_from_payload(payload: &Value) -> Result<Vec<StudyPoint>, SdkError> {
    let Some(object) = payload.as_object() else {
        return Ok(Vec::new());
    };

    let mut rows: Vec<SeriesRow> = Vec::new();
    if object.contains_key("st") {
        if let Ok(bucket) = serde_json::from_value::<SeriesBucket>(payload.clone()) {
            rows.extend(bucket.study);
        }
    } else {
        for entry in object.values() {
            let Ok(bucket) = serde_json::from_value::<SeriesBucket>(entry.clone()) else {
                continue;
            };
            rows.extend(bucket.study);
        }
    }
    rows.sort_by_key(|r| r.i);

    rows.iter().map(StudyPoint::from_row).collect()
}
