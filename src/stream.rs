//! Streaming facade: subscriptions in, a [`PacketStream`] of decoded
//! packets out.
//!
//! [`Streamer::stream`] resolves indicators, opens one connection with the
//! right sessions, and hands back a `futures_util::Stream`. The lower-level
//! [`StreamHandle`] stays reachable through [`PacketStream::handle`] for
//! mid-stream session control.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use pin_project_lite::pin_project;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::client::ChartfeedClient;
use crate::domain::chart::{bars_from_payload, OhlcBar};
use crate::domain::indicator::{
    points_from_payload, IndicatorMetadata, IndicatorSpec, StudyPoint, BUILTIN_INDICATORS,
};
use crate::domain::quote::QuoteUpdate;
use crate::error::{SdkError, WsError};
use crate::shared::{Symbol, Timeframe};
use crate::ws::{SessionId, StreamHandle};

// ─── Packet ──────────────────────────────────────────────────────────────────

/// What a [`Packet`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Server hello, first packet on every fresh connection.
    Init,
    /// Quote field update for one symbol.
    QuoteData,
    /// Candle data for a chart session.
    ChartData,
    /// Indicator output points for a study session.
    StudyData,
    /// The chart series finished its initial history load.
    SeriesComplete,
    /// Session-scoped or connection-scoped server error.
    Error,
    /// Client-side notice, e.g. indicators dropped during resolution.
    Diagnostic,
    /// The connection dropped and came back; sessions were replayed.
    Reconnected,
}

/// One decoded message from the platform.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Producing session, for session-scoped packets.
    pub session: Option<SessionId>,
    pub kind: PacketKind,
    /// Wire method that carried the payload, when one applies.
    pub method: Option<String>,
    pub payload: Value,
}

impl Packet {
    pub(crate) fn init(payload: Value) -> Self {
        Self {
            session: None,
            kind: PacketKind::Init,
            method: None,
            payload,
        }
    }

    pub(crate) fn quote_data(session: SessionId, payload: Value) -> Self {
        Self {
            session: Some(session),
            kind: PacketKind::QuoteData,
            method: Some("qsd".to_string()),
            payload,
        }
    }

    pub(crate) fn chart_data(session: SessionId, method: String, payload: Value) -> Self {
        Self {
            session: Some(session),
            kind: PacketKind::ChartData,
            method: Some(method),
            payload,
        }
    }

    pub(crate) fn study_data(session: SessionId, payload: Value) -> Self {
        Self {
            session: Some(session),
            kind: PacketKind::StudyData,
            method: Some("study".to_string()),
            payload,
        }
    }

    pub(crate) fn series_complete(session: SessionId) -> Self {
        Self {
            session: Some(session),
            kind: PacketKind::SeriesComplete,
            method: Some("series_completed".to_string()),
            payload: Value::Null,
        }
    }

    pub(crate) fn error(session: Option<SessionId>, method: &str, payload: Value) -> Self {
        Self {
            session,
            kind: PacketKind::Error,
            method: Some(method.to_string()),
            payload,
        }
    }

    pub(crate) fn diagnostic(payload: Value) -> Self {
        Self {
            session: None,
            kind: PacketKind::Diagnostic,
            method: None,
            payload,
        }
    }

    pub(crate) fn reconnected() -> Self {
        Self {
            session: None,
            kind: PacketKind::Reconnected,
            method: None,
            payload: Value::Null,
        }
    }

    /// Decode as a quote update. `None` for other kinds or an unparseable
    /// payload.
    pub fn as_quote(&self) -> Option<QuoteUpdate> {
        if self.kind != PacketKind::QuoteData {
            return None;
        }
        QuoteUpdate::from_value(&self.payload).ok()
    }

    /// Decode chart data into candles. Empty for other kinds.
    pub fn as_bars(&self) -> Vec<OhlcBar> {
        if self.kind != PacketKind::ChartData {
            return Vec::new();
        }
        bars_from_payload(&self.payload).unwrap_or_default()
    }

    /// Decode study data into indicator points. Empty for other kinds.
    pub fn as_study_points(&self) -> Vec<StudyPoint> {
        if self.kind != PacketKind::StudyData {
            return Vec::new();
        }
        points_from_payload(&self.payload).unwrap_or_default()
    }

    pub fn is_error(&self) -> bool {
        self.kind == PacketKind::Error
    }
}

// ─── SubscriptionSpec ────────────────────────────────────────────────────────

/// What to stream for one symbol.
#[derive(Debug, Clone)]
pub struct SubscriptionSpec {
    /// `EXCHANGE:TICKER` string, validated before anything is dialed.
    pub symbol: String,
    /// Chart resolution for candles and attached studies.
    pub timeframe: Timeframe,
    /// Indicators to attach, each pinned to a version.
    pub indicators: Vec<IndicatorSpec>,
    /// Attach the whole built-in catalog instead of `indicators`.
    pub all_indicators: bool,
}

impl SubscriptionSpec {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: Timeframe::default(),
            indicators: Vec::new(),
            all_indicators: false,
        }
    }

    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn indicator(mut self, spec: IndicatorSpec) -> Self {
        self.indicators.push(spec);
        self
    }

    pub fn all_indicators(mut self) -> Self {
        self.all_indicators = true;
        self
    }
}

// ─── PacketStream ────────────────────────────────────────────────────────────

pin_project! {
    /// Stream of decoded packets from one connection.
    ///
    /// Yields `Ok` packets until the connection ends: a terminal error is
    /// yielded once as `Err`, then the stream is finished. Dropping the
    /// stream tears the connection down.
    #[derive(Debug)]
    pub struct PacketStream {
        handle: StreamHandle,
        #[pin]
        packet_rx: mpsc::Receiver<Result<Packet, WsError>>,
        pending: VecDeque<Packet>,
        done: bool,
    }
}

impl PacketStream {
    pub(crate) fn new(
        handle: StreamHandle,
        packet_rx: mpsc::Receiver<Result<Packet, WsError>>,
        pending: VecDeque<Packet>,
    ) -> Self {
        Self {
            handle,
            packet_rx,
            pending,
            done: false,
        }
    }

    /// Handle for opening and closing sessions while the stream runs.
    pub fn handle(&self) -> &StreamHandle {
        &self.handle
    }

    /// Graceful shutdown: delete every session, close the socket, wait for
    /// the connection task to finish.
    pub async fn close(mut self) -> Result<(), WsError> {
        self.handle.close().await
    }
}

impl Stream for PacketStream {
    type Item = Result<Packet, SdkError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        if let Some(packet) = this.pending.pop_front() {
            return Poll::Ready(Some(Ok(packet)));
        }
        match this.packet_rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(packet))) => Poll::Ready(Some(Ok(packet))),
            Poll::Ready(Some(Err(e))) => {
                *this.done = true;
                Poll::Ready(Some(Err(e.into())))
            }
            Poll::Ready(None) => {
                *this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

// ─── Streamer ────────────────────────────────────────────────────────────────

/// Streaming sub-client, entered through [`ChartfeedClient::streamer`].
pub struct Streamer<'a> {
    pub(crate) client: &'a ChartfeedClient,
}

impl<'a> Streamer<'a> {
    /// Open a connection streaming quotes, candles, and studies for `specs`.
    ///
    /// Every spec is validated before any indicator is resolved or anything
    /// is dialed. Indicators that fail to resolve are dropped from the
    /// subscription and reported in one leading [`PacketKind::Diagnostic`]
    /// packet; the stream still opens for everything that resolved.
    pub async fn stream(&self, specs: &[SubscriptionSpec]) -> Result<PacketStream, SdkError> {
        if specs.is_empty() {
            return Err(SdkError::Validation(
                "at least one subscription is required".to_string(),
            ));
        }

        // Validation pass: reject the whole call before any I/O.
        let mut symbols = Vec::with_capacity(specs.len());
        for spec in specs {
            symbols.push(spec.symbol.parse::<Symbol>()?);
            if spec.all_indicators {
                continue;
            }
            for indicator in &spec.indicators {
                if indicator.version.is_none() {
                    return Err(SdkError::Validation(format!(
                        "indicator '{}' requires an explicit version (or subscribe with all_indicators)",
                        indicator.id
                    )));
                }
            }
        }

        // Resolution pass. Failures degrade the subscription, not the call.
        let indicators = self.client.indicators();
        let mut resolved: Vec<Vec<IndicatorMetadata>> = Vec::with_capacity(specs.len());
        let mut dropped: Vec<(String, String)> = Vec::new();
        for spec in specs {
            let mut metas = Vec::new();
            if spec.all_indicators {
                for (id, version) in BUILTIN_INDICATORS {
                    match indicators.resolve(id, version).await {
                        Ok(meta) => metas.push(meta),
                        Err(e) => {
                            tracing::warn!("Dropping indicator {}: {}", id, e);
                            dropped.push((id.to_string(), e.to_string()));
                        }
                    }
                }
            } else {
                for indicator in &spec.indicators {
                    match indicators.resolve_spec(indicator).await {
                        Ok(meta) => metas.push(meta),
                        Err(e) => {
                            tracing::warn!("Dropping indicator {}: {}", indicator.id, e);
                            dropped.push((indicator.id.clone(), e.to_string()));
                        }
                    }
                }
            }
            resolved.push(metas);
        }

        // Launch pass: one connection, one shared quote session, one chart
        // session per spec with its studies attached.
        let (handle, packet_rx) = StreamHandle::connect(self.client.stream_config.clone());
        handle.open_quote_session(symbols.clone()).await?;
        for ((spec, symbol), metas) in specs.iter().zip(&symbols).zip(resolved) {
            let chart = handle
                .open_chart_session(symbol.clone(), spec.timeframe)
                .await?;
            for meta in metas {
                handle.open_study_session(&chart, meta).await?;
            }
        }

        let mut pending = VecDeque::new();
        if !dropped.is_empty() {
            let entries: Vec<Value> = dropped
                .iter()
                .map(|(id, error)| json!({ "id": id, "error": error }))
                .collect();
            pending.push_back(Packet::diagnostic(json!({ "dropped_indicators": entries })));
        }

        Ok(PacketStream::new(handle, packet_rx, pending))
    }

    /// Quote-only stream over one shared quote session.
    pub async fn stream_quotes(&self, symbols: &[&str]) -> Result<PacketStream, SdkError> {
        if symbols.is_empty() {
            return Err(SdkError::Validation(
                "at least one symbol is required".to_string(),
            ));
        }
        let mut parsed = Vec::with_capacity(symbols.len());
        for raw in symbols {
            parsed.push(raw.parse::<Symbol>()?);
        }

        let (handle, packet_rx) = StreamHandle::connect(self.client.stream_config.clone());
        handle.open_quote_session(parsed).await?;
        Ok(PacketStream::new(handle, packet_rx, VecDeque::new()))
    }

    /// Candle-only stream for one symbol at one resolution.
    pub async fn stream_ohlc(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<PacketStream, SdkError> {
        let symbol: Symbol = symbol.parse()?;

        let (handle, packet_rx) = StreamHandle::connect(self.client.stream_config.clone());
        handle.open_chart_session(symbol, timeframe).await?;
        Ok(PacketStream::new(handle, packet_rx, VecDeque::new()))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
