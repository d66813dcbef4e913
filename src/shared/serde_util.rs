//! Custom serde helpers for platform wire formats.

/// Deserializes a Unix-seconds number into `DateTime<Utc>`.
///
/// Chart series rows carry bar timestamps as fractional epoch seconds
/// (f64), not ISO 8601 strings.
pub mod timestamp_secs {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        DateTime::<Utc>::from_timestamp_millis((secs * 1000.0) as i64)
            .ok_or_else(|| serde::de::Error::custom(format!("Invalid timestamp: {}", secs)))
    }
}

/// Like [`timestamp_secs`] for optional fields; `null` and absent both map
/// to `None`.
pub mod timestamp_secs_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(secs) = Option::<f64>::deserialize(deserializer)? else {
            return Ok(None);
        };
        DateTime::<Utc>::from_timestamp_millis((secs * 1000.0) as i64)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("Invalid timestamp: {}", secs)))
    }
}
