//! Wire types for the indicator metadata (translate) service.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Response from `GET /translate/{id}/{version}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslateResponse {
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub result: Option<TranslateResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateResult {
    #[serde(rename = "metaInfo", default)]
    pub meta_info: Option<MetaInfo>,
    /// Compiled script payload passed through to `create_study`.
    #[serde(rename = "ilTemplate", default)]
    pub il_template: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaInfo {
    #[serde(default)]
    pub inputs: Vec<MetaInput>,
    #[serde(default)]
    pub plots: Vec<MetaPlot>,
    /// Plot id → presentation info; the source of output titles.
    #[serde(default)]
    pub styles: HashMap<String, MetaStyle>,
    #[serde(rename = "shortDescription", default)]
    pub short_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaInput {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub input_type: Option<String>,
    #[serde(rename = "defval", default)]
    pub default: Option<Value>,
    #[serde(rename = "isHidden", default)]
    pub is_hidden: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaPlot {
    pub id: String,
    #[serde(rename = "type", default)]
    pub plot_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaStyle {
    #[serde(default)]
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_response_deserializes() {
        let json = r#"{
            "success": true,
            "result": {
                "metaInfo": {
                    "shortDescription": "RSI",
                    "inputs": [
                        {"id": "in_0", "name": "Length", "type": "integer", "defval": 14},
                        {"id": "text", "type": "text", "isHidden": true}
                    ],
                    "plots": [{"id": "plot_0", "type": "line"}],
                    "styles": {"plot_0": {"title": "RSI"}}
                },
                "ilTemplate": "Script@tv-scope..."
            }
        }"#;
        let resp: TranslateResponse = serde_json::from_str(json).unwrap();
        assert!(resp.success);
        let result = resp.result.unwrap();
        let meta = result.meta_info.unwrap();
        assert_eq!(meta.inputs.len(), 2);
        assert_eq!(meta.inputs[0].default, Some(serde_json::json!(14)));
        assert!(meta.inputs[1].is_hidden);
        assert_eq!(meta.plots[0].id, "plot_0");
        assert_eq!(meta.styles["plot_0"].title.as_deref(), Some("RSI"));
        assert_eq!(result.il_template.as_deref(), Some("Script@tv-scope..."));
    }

    #[test]
    fn test_translate_failure_deserializes() {
        let json = r#"{"success": false, "reason": "Unknown indicator"}"#;
        let resp: TranslateResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.reason.as_deref(), Some("Unknown indicator"));
        assert!(resp.result.is_none());
    }
}
