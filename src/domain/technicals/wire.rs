//! Wire types for the scanner (technicals) endpoint.

use serde::Deserialize;
use serde_json::Value;

/// Flat field → value map returned by `GET /symbol`.
///
/// With `no_404=true` the scanner omits unknown fields instead of failing
/// the whole request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ScannerResponse(pub serde_json::Map<String, Value>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_response_is_flat_map() {
        let json = r#"{"RSI|60": 63.5, "Stoch.K|60": 80.1, "EMA50|60": null}"#;
        let resp: ScannerResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.0["RSI|60"], 63.5);
        assert!(resp.0["EMA50|60"].is_null());
    }
}
