//! Indicators sub-client — resolve, cache.

use crate::client::ChartfeedClient;
use crate::domain::indicator::{metadata_from_translate, IndicatorMetadata, IndicatorSpec};
use crate::error::{HttpError, ResolveError, SdkError};

/// Sub-client for indicator metadata operations.
pub struct Indicators<'a> {
    pub(crate) client: &'a ChartfeedClient,
}

impl<'a> Indicators<'a> {
    /// Resolve an id/version pair to usable metadata. Uses the
    /// process-lifetime cache; descriptors never change under a version.
    pub async fn resolve(&self, id: &str, version: &str) -> Result<IndicatorMetadata, SdkError> {
        let key = (id.to_string(), version.to_string());
        {
            let cache = self.client.indicator_cache.read().await;
            if let Some(meta) = cache.get(&key) {
                return Ok(meta.clone());
            }
        }

        let resp = match self.client.http.get_indicator_translation(id, version).await {
            Ok(resp) => resp,
            Err(HttpError::NotFound(_)) => {
                return Err(ResolveError::NotFound {
                    id: id.to_string(),
                    version: version.to_string(),
                }
                .into());
            }
            Err(HttpError::MaxRetriesExceeded {
                attempts,
                last_error,
            }) => {
                return Err(ResolveError::Unavailable {
                    attempts,
                    last_error,
                }
                .into());
            }
            Err(e) => {
                return Err(ResolveError::Unavailable {
                    attempts: 1,
                    last_error: e.to_string(),
                }
                .into());
            }
        };

        if !resp.success {
            return Err(ResolveError::NotFound {
                id: id.to_string(),
                version: version.to_string(),
            }
            .into());
        }

        let meta = metadata_from_translate(id, version, resp)?;
        self.client
            .indicator_cache
            .write()
            .await
            .insert(key, meta.clone());
        Ok(meta)
    }

    /// Resolve a caller spec. A spec without a pinned version is rejected
    /// here, before any network traffic.
    pub async fn resolve_spec(&self, spec: &IndicatorSpec) -> Result<IndicatorMetadata, SdkError> {
        let Some(version) = &spec.version else {
            return Err(SdkError::Validation(format!(
                "indicator '{}' requires an explicit version (or subscribe with all_indicators)",
                spec.id
            )));
        };
        self.resolve(&spec.id, version).await
    }

    /// Drop every cached descriptor.
    pub async fn clear_cache(&self) {
        self.client.indicator_cache.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChartfeedClientBuilder;

    #[tokio::test]
    async fn test_resolve_hits_cache_without_network() {
        // Unroutable URLs: a cache hit must not touch them.
        let client = ChartfeedClientBuilder::new()
            .indicator_url("http://127.0.0.1:1")
            .scanner_url("http://127.0.0.1:1")
            .build();
        let meta = IndicatorMetadata::test_fixture("STD;RSI", "last");
        client
            .indicator_cache
            .write()
            .await
            .insert(("STD;RSI".to_string(), "last".to_string()), meta.clone());

        let resolved = client.indicators().resolve("STD;RSI", "last").await.unwrap();
        assert_eq!(resolved, meta);
    }

    #[tokio::test]
    async fn test_resolve_spec_without_version_fails_before_io() {
        let client = ChartfeedClientBuilder::new()
            .indicator_url("http://127.0.0.1:1")
            .scanner_url("http://127.0.0.1:1")
            .build();
        let err = client
            .indicators()
            .resolve_spec(&IndicatorSpec::new("USER;custom"))
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Validation(_)));
    }
}
