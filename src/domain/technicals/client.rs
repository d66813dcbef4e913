//! Technicals sub-client — snapshot scrapes against the scanner.

use crate::client::ChartfeedClient;
use crate::domain::technicals::{
    request_fields, snapshot_from_response, TechnicalsSelection, TechnicalsSnapshot,
};
use crate::shared::{Symbol, Timeframe};

/// Sub-client for point-in-time technicals.
pub struct Technicals<'a> {
    pub(crate) client: &'a ChartfeedClient,
}

impl<'a> Technicals<'a> {
    /// Fetch current indicator values for one symbol.
    ///
    /// Infallible by contract: any transport or decode failure comes back
    /// as a snapshot with `status: failed` and the reason in `error`.
    pub async fn scrape(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        selection: &TechnicalsSelection,
    ) -> TechnicalsSnapshot {
        let names = selection.names();
        if names.is_empty() {
            return TechnicalsSnapshot::failed("no indicator fields selected");
        }
        let fields = request_fields(&names, timeframe);

        match self
            .client
            .http
            .get_scanner_snapshot(symbol.as_str(), &fields)
            .await
        {
            Ok(resp) => snapshot_from_response(&names, &fields, &resp),
            Err(e) => {
                tracing::warn!("Technicals scrape for {} failed: {}", symbol, e);
                TechnicalsSnapshot::failed(e.to_string())
            }
        }
    }
}
