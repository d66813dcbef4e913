//! Wire → domain conversion for indicator metadata.

use crate::domain::indicator::wire::TranslateResponse;
use crate::domain::indicator::{IndicatorInput, IndicatorMetadata, IndicatorOutput};
use crate::error::ResolveError;

/// Build usable metadata out of a successful translate response.
///
/// A descriptor that cannot drive a study session (no compiled script, no
/// plots) is `MetadataIncomplete`, which callers surface differently from a
/// plain miss.
pub(crate) fn metadata_from_translate(
    id: &str,
    version: &str,
    resp: TranslateResponse,
) -> Result<IndicatorMetadata, ResolveError> {
    let incomplete = |missing: &str| ResolveError::MetadataIncomplete {
        id: id.to_string(),
        missing: missing.to_string(),
    };

    let result = resp.result.ok_or_else(|| incomplete("result"))?;
    let meta = result.meta_info.ok_or_else(|| incomplete("metaInfo"))?;
    let script = match result.il_template {
        Some(s) if !s.is_empty() => s,
        _ => return Err(incomplete("ilTemplate")),
    };
    if meta.plots.is_empty() {
        return Err(incomplete("plots"));
    }

    let inputs = meta
        .inputs
        .into_iter()
        .map(|i| IndicatorInput {
            id: i.id,
            name: i.name,
            input_type: i.input_type,
            default: i.default,
            hidden: i.is_hidden,
        })
        .collect();

    let outputs = meta
        .plots
        .iter()
        .map(|p| {
            let title = meta
                .styles
                .get(&p.id)
                .and_then(|s| s.title.clone())
                .unwrap_or_else(|| p.id.clone());
            IndicatorOutput {
                field: p.id.clone(),
                title,
            }
        })
        .collect();

    Ok(IndicatorMetadata {
        id: id.to_string(),
        version: version.to_string(),
        inputs,
        outputs,
        script,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_response() -> TranslateResponse {
        serde_json::from_str(
            r#"{
                "success": true,
                "result": {
                    "metaInfo": {
                        "inputs": [
                            {"id": "in_0", "name": "Length", "type": "integer", "defval": 14},
                            {"id": "text", "type": "text", "isHidden": true}
                        ],
                        "plots": [{"id": "plot_0", "type": "line"}, {"id": "plot_1", "type": "line"}],
                        "styles": {"plot_0": {"title": "RSI"}}
                    },
                    "ilTemplate": "Script@tv-scope"
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_convert_full_response() {
        let meta = metadata_from_translate("STD;RSI", "last", full_response()).unwrap();
        assert_eq!(meta.id, "STD;RSI");
        assert_eq!(meta.version, "last");
        assert_eq!(meta.script, "Script@tv-scope");
        assert_eq!(meta.inputs.len(), 2);
        assert_eq!(meta.outputs.len(), 2);
        assert_eq!(meta.outputs[0].field, "plot_0");
        assert_eq!(meta.outputs[0].title, "RSI");
        // No style entry falls back to the plot id.
        assert_eq!(meta.outputs[1].title, "plot_1");
    }

    #[test]
    fn test_missing_script_is_incomplete() {
        let mut resp = full_response();
        resp.result.as_mut().unwrap().il_template = None;
        let err = metadata_from_translate("STD;RSI", "last", resp).unwrap_err();
        assert!(
            matches!(err, ResolveError::MetadataIncomplete { ref missing, .. } if missing == "ilTemplate")
        );
    }

    #[test]
    fn test_empty_plots_is_incomplete() {
        let mut resp = full_response();
        resp.result.as_mut().unwrap().meta_info.as_mut().unwrap().plots.clear();
        let err = metadata_from_translate("STD;RSI", "last", resp).unwrap_err();
        assert!(
            matches!(err, ResolveError::MetadataIncomplete { ref missing, .. } if missing == "plots")
        );
    }

    #[test]
    fn test_missing_meta_info_is_incomplete() {
        let mut resp = full_response();
        resp.result.as_mut().unwrap().meta_info = None;
        let err = metadata_from_translate("STD;RSI", "last", resp).unwrap_err();
        assert!(
            matches!(err, ResolveError::MetadataIncomplete { ref missing, .. } if missing == "metaInfo")
        );
    }
}
