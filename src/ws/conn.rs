//! Connection task and the [`StreamHandle`] driving it.
//!
//! One background tokio task per handle owns the socket and the session
//! table; nothing else touches either. The handle talks to it over an mpsc
//! command channel, decoded packets come back over a bounded packet channel
//! whose `send().await` throttles the socket reader when the consumer lags.
//!
//! - Session opens travel as request/reply commands with a oneshot ack
//! - Server heartbeats are echoed verbatim from inside the task
//! - Reconnection replays every live session before any other traffic
//! - Dropping the handle aborts the task and releases the socket

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::domain::indicator::IndicatorMetadata;
use crate::domain::quote::DEFAULT_QUOTE_FIELDS;
use crate::error::{SdkError, WsError};
use crate::shared::{Symbol, Timeframe};
use crate::stream::Packet;
use crate::ws::frame::{self, Frame, FrameDecoder};
use crate::ws::message::{self, ServerMessage};
use crate::ws::session::{Session, SessionId, SessionKind, SessionSpec, SessionTable};
use crate::ws::{encode_command, ReadyState, StreamConfig};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Series reference inside a chart session. One series per chart.
const SERIES_ID: &str = "sds_1";
/// Symbol slot the series resolves against.
const SYMBOL_REF: &str = "sds_sym_1";
/// Script runtime tag the platform expects on `create_study`.
const STUDY_RUNTIME: &str = "Script@tv-scripting-101!";

// ─── Commands from the handle to the background task ─────────────────────────

type Reply<T> = oneshot::Sender<Result<T, SdkError>>;

enum Command {
    OpenQuote {
        symbols: Vec<Symbol>,
        reply: Reply<SessionId>,
    },
    OpenChart {
        symbol: Symbol,
        timeframe: Timeframe,
        reply: Reply<SessionId>,
    },
    OpenStudy {
        chart: SessionId,
        metadata: IndicatorMetadata,
        reply: Reply<SessionId>,
    },
    AddSymbols {
        session: SessionId,
        symbols: Vec<Symbol>,
        reply: Reply<()>,
    },
    Close {
        session: SessionId,
        reply: Reply<()>,
    },
    Raw {
        method: String,
        params: Vec<Value>,
    },
    Shutdown,
}

// ─── Disconnect reasons for the reconnection decision ────────────────────────

enum DisconnectReason {
    UserRequested,
    ConsumerGone,
    Closed { code: u16, reason: String },
    Protocol(String),
    Silence,
    Error(String),
}

// ─── Background task state ───────────────────────────────────────────────────

struct ConnTask {
    config: StreamConfig,
    packet_tx: mpsc::Sender<Result<Packet, WsError>>,
    cmd_rx: mpsc::Receiver<Command>,
    table: SessionTable,
    reconnect_attempts: u32,
    ready_state: Arc<AtomicU16>,
}

impl ConnTask {
    /// Push one packet to the consumer, honoring backpressure.
    /// False means the consumer dropped its end of the stream.
    async fn emit(&self, packet: Packet) -> bool {
        self.packet_tx.send(Ok(packet)).await.is_ok()
    }

    /// Deliver the terminal error; the task ends right after.
    async fn fail(&self, error: WsError) {
        let _ = self.packet_tx.send(Err(error)).await;
    }

    fn should_reconnect(&self) -> bool {
        self.config.reconnect
            && (self.config.max_reconnect_attempts == 0
                || self.reconnect_attempts < self.config.max_reconnect_attempts)
    }
}

// ─── Public StreamHandle ─────────────────────────────────────────────────────

/// Handle onto one streaming connection.
///
/// Created with [`StreamHandle::connect`], which spawns the background task
/// and starts dialing. Session commands issued before the socket is up are
/// queued and run in order once the handshake completes.
#[derive(Debug)]
pub struct StreamHandle {
    cmd_tx: mpsc::Sender<Command>,
    ready_state: Arc<AtomicU16>,
    task_handle: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Spawn the connection task. Returns the handle and the packet channel
    /// receiver; [`crate::stream::PacketStream`] wraps both.
    pub fn connect(config: StreamConfig) -> (Self, mpsc::Receiver<Result<Packet, WsError>>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (packet_tx, packet_rx) = mpsc::channel(config.packet_buffer.max(1));
        let ready_state = Arc::new(AtomicU16::new(ReadyState::Connecting as u16));

        let state = ConnTask {
            config,
            packet_tx,
            cmd_rx,
            table: SessionTable::new(),
            reconnect_attempts: 0,
            ready_state: Arc::clone(&ready_state),
        };
        let handle = tokio::spawn(run_task(state));

        (
            Self {
                cmd_tx,
                ready_state,
                task_handle: Some(handle),
            },
            packet_rx,
        )
    }

    /// Open a quote session covering `symbols` with the default field set.
    pub async fn open_quote_session(&self, symbols: Vec<Symbol>) -> Result<SessionId, SdkError> {
        self.request(|reply| Command::OpenQuote { symbols, reply })
            .await
    }

    /// Open a chart session streaming OHLC bars for one symbol.
    pub async fn open_chart_session(
        &self,
        symbol: Symbol,
        timeframe: Timeframe,
    ) -> Result<SessionId, SdkError> {
        self.request(|reply| Command::OpenChart {
            symbol,
            timeframe,
            reply,
        })
        .await
    }

    /// Attach a study session to a live chart session.
    pub async fn open_study_session(
        &self,
        chart: &SessionId,
        metadata: IndicatorMetadata,
    ) -> Result<SessionId, SdkError> {
        let chart = chart.clone();
        self.request(|reply| Command::OpenStudy {
            chart,
            metadata,
            reply,
        })
        .await
    }

    /// Add symbols to a live quote session.
    pub async fn add_symbols(
        &self,
        session: &SessionId,
        symbols: Vec<Symbol>,
    ) -> Result<(), SdkError> {
        let session = session.clone();
        self.request(|reply| Command::AddSymbols {
            session,
            symbols,
            reply,
        })
        .await
    }

    /// Close a session, cascading chart closes onto dependent studies.
    /// Closing an unknown or already-closed session is a no-op.
    pub async fn close_session(&self, session: &SessionId) -> Result<(), SdkError> {
        let session = session.clone();
        self.request(|reply| Command::Close { session, reply })
            .await
    }

    /// Send a raw protocol command.
    ///
    /// Fails fast with [`WsError::NotConnected`] while the transport is down;
    /// raw sends are never queued across a reconnect.
    pub fn send(&self, method: &str, params: Vec<Value>) -> Result<(), WsError> {
        if self.ready_state() != ReadyState::Open {
            return Err(WsError::NotConnected);
        }
        self.cmd_tx
            .try_send(Command::Raw {
                method: method.to_string(),
                params,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    WsError::SendFailed("Command channel full".into())
                }
                mpsc::error::TrySendError::Closed(_) => WsError::NotConnected,
            })
    }

    /// Whether the socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Current connection state.
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.ready_state.load(Ordering::SeqCst))
    }

    /// Graceful teardown: delete every session, close the socket, and wait
    /// for the background task to finish.
    pub async fn close(&mut self) -> Result<(), WsError> {
        let _ = self.cmd_tx.send(Command::Shutdown).await;

        if let Some(handle) = self.task_handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }

        self.ready_state
            .store(ReadyState::Closed as u16, Ordering::SeqCst);
        Ok(())
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SdkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| WsError::NotConnected)?;
        reply_rx.await.map_err(|_| WsError::NotConnected)?
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: ConnTask) {
    let mut first_connect = true;
    loop {
        // ── 1. Attempt connection ────────────────────────────────────────
        state
            .ready_state
            .store(ReadyState::Connecting as u16, Ordering::SeqCst);

        let (mut sink, stream) = match attempt_connect(&state.config.url).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!("WebSocket connection failed: {}", e);
                if state.should_reconnect() {
                    backoff_sleep(&mut state).await;
                    continue;
                }
                state
                    .ready_state
                    .store(ReadyState::Closed as u16, Ordering::SeqCst);
                let error = if state.config.reconnect {
                    WsError::RetriesExhausted {
                        attempts: state.reconnect_attempts,
                        last_error: e,
                    }
                } else {
                    WsError::ConnectionFailed(e)
                };
                state.fail(error).await;
                return;
            }
        };

        // ── 2. Connected ─────────────────────────────────────────────────
        let reconnecting = !first_connect;
        first_connect = false;
        state.reconnect_attempts = 0;
        state
            .ready_state
            .store(ReadyState::Open as u16, Ordering::SeqCst);

        // ── 3. Handshake, then replay, before any interleaved traffic ────
        if let Err(e) = announce(&mut state, &mut sink).await {
            tracing::error!("Handshake failed: {}", e);
            state
                .ready_state
                .store(ReadyState::Closed as u16, Ordering::SeqCst);
            if state.should_reconnect() {
                backoff_sleep(&mut state).await;
                continue;
            }
            state.fail(WsError::SendFailed(e)).await;
            return;
        }
        if reconnecting && !state.emit(Packet::reconnected()).await {
            return;
        }

        // ── 4. Inner select! loop ────────────────────────────────────────
        let reason = run_connected(&mut state, sink, stream).await;

        // ── 5. Post-disconnect decision ──────────────────────────────────
        state
            .ready_state
            .store(ReadyState::Closed as u16, Ordering::SeqCst);

        let error = match reason {
            DisconnectReason::UserRequested | DisconnectReason::ConsumerGone => return,
            DisconnectReason::Closed { code, reason } => WsError::Closed {
                code: Some(code),
                reason,
            },
            DisconnectReason::Protocol(detail) => WsError::ProtocolError(detail),
            DisconnectReason::Silence => WsError::ConnectionFailed("heartbeat silence".into()),
            DisconnectReason::Error(detail) => WsError::ConnectionFailed(detail),
        };

        if state.should_reconnect() {
            state
                .ready_state
                .store(ReadyState::Connecting as u16, Ordering::SeqCst);
            backoff_sleep(&mut state).await;
            continue;
        }

        if state.config.reconnect {
            state
                .fail(WsError::RetriesExhausted {
                    attempts: state.reconnect_attempts,
                    last_error: error.to_string(),
                })
                .await;
        } else {
            state.fail(error).await;
        }
        return;
    }
}

/// First traffic on a fresh socket: auth, locale, then a full replay of
/// every tracked session in creation order, parents before studies.
async fn announce(state: &mut ConnTask, sink: &mut WsSink) -> Result<(), String> {
    send_text(
        sink,
        encode_command("set_auth_token", &[json!(state.config.auth_token)]),
    )
    .await?;
    let (language, region) = &state.config.locale;
    send_text(
        sink,
        encode_command("set_locale", &[json!(language), json!(region)]),
    )
    .await?;

    if !state.table.is_empty() {
        state.table.mark_all_pending();
        tracing::info!("Replaying {} session(s) after reconnect", state.table.len());
        let frames: Vec<String> = state
            .table
            .replay_order()
            .iter()
            .flat_map(|session| open_commands(session, &state.config))
            .collect();
        for frame in frames {
            send_text(sink, frame).await?;
        }
    }
    Ok(())
}

/// The inner connected loop — runs until the connection breaks.
async fn run_connected(
    state: &mut ConnTask,
    mut sink: WsSink,
    mut stream: SplitStream<WsStream>,
) -> DisconnectReason {
    let mut decoder = FrameDecoder::new();

    let heartbeat_window = Duration::from_millis(state.config.heartbeat_timeout_ms);
    let silence = tokio::time::sleep(heartbeat_window);
    tokio::pin!(silence);

    let mut ack_sweep = tokio::time::interval(Duration::from_secs(1));
    ack_sweep.reset(); // skip immediate first tick

    loop {
        tokio::select! {
            // ── a) Incoming WS message ───────────────────────────────────
            msg = stream.next() => {
                // Any socket event counts as server activity.
                silence.as_mut().reset(tokio::time::Instant::now() + heartbeat_window);
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let frames = match decoder.feed(text.as_ref()) {
                            Ok(frames) => frames,
                            Err(e) => {
                                tracing::error!("Framing violation: {}", e);
                                let _ = sink.close().await;
                                return DisconnectReason::Protocol(e.to_string());
                            }
                        };
                        for item in frames {
                            match item {
                                Frame::Heartbeat(n) => {
                                    if let Err(e) =
                                        send_text(&mut sink, frame::encode_heartbeat(n)).await
                                    {
                                        tracing::warn!("Heartbeat echo failed: {}", e);
                                        return DisconnectReason::Error(e);
                                    }
                                }
                                Frame::Message(body) => {
                                    let parsed = message::parse(&body);
                                    if let Some(reason) = handle_message(state, parsed).await {
                                        return reason;
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(close))) => {
                        let (code, reason) = extract_close(close.as_ref());
                        tracing::warn!("Server closed the connection: {} {}", code, reason);
                        return DisconnectReason::Closed { code, reason };
                    }
                    Some(Ok(_)) => {} // Binary, Frame — the protocol is text-only
                    Some(Err(e)) => {
                        let reason = e.to_string();
                        tracing::error!("WebSocket error: {}", reason);
                        return DisconnectReason::Error(reason);
                    }
                    None => {
                        return DisconnectReason::Error("Stream ended".into());
                    }
                }
            }

            // ── b) Command from the handle ───────────────────────────────
            cmd = state.cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => {
                        if let Some(reason) = handle_command(state, &mut sink, cmd).await {
                            return reason;
                        }
                    }
                    None => {
                        // StreamHandle dropped — clean exit
                        return DisconnectReason::UserRequested;
                    }
                }
            }

            // ── c) Ack sweep ─────────────────────────────────────────────
            _ = ack_sweep.tick() => {
                let window = Duration::from_millis(state.config.ack_timeout_ms);
                for id in state.table.sweep_pending(window) {
                    tracing::warn!(
                        "Session {} unacked after {}ms, accepting data unconfirmed",
                        id,
                        state.config.ack_timeout_ms
                    );
                }
            }

            // ── d) Heartbeat silence ─────────────────────────────────────
            () = &mut silence => {
                tracing::warn!(
                    "No server traffic within {}ms, dropping the connection",
                    state.config.heartbeat_timeout_ms
                );
                let _ = sink.close().await;
                return DisconnectReason::Silence;
            }
        }
    }
}

// ─── Inbound dispatch ────────────────────────────────────────────────────────

/// Route one classified message: update the session table, then decide what
/// the consumer sees. `Some` aborts the connected loop.
async fn handle_message(state: &mut ConnTask, msg: ServerMessage) -> Option<DisconnectReason> {
    let packet = match msg {
        ServerMessage::Hello { info } => {
            tracing::debug!("Server hello: {}", info);
            Some(Packet::init(info))
        }
        ServerMessage::QuoteData { session, payload } => {
            route(state, &session).map(|id| Packet::quote_data(id, payload))
        }
        ServerMessage::ChartData {
            session,
            method,
            payload,
        } => route(state, &session).map(|id| Packet::chart_data(id, method, payload)),
        ServerMessage::StudyData { session, payload } => {
            route(state, &session).map(|id| Packet::study_data(id, payload))
        }
        ServerMessage::QuoteCompleted { session, symbol } => {
            state.table.confirm(&session);
            if let Some(symbol) = symbol {
                tracing::debug!("Quote session {} loaded {}", session, symbol);
            }
            None
        }
        ServerMessage::SeriesCompleted { session } => {
            state.table.confirm(&session);
            route(state, &session).map(Packet::series_complete)
        }
        ServerMessage::StudyCompleted { session } => {
            state.table.confirm(&session);
            None
        }
        ServerMessage::SymbolError { session, detail } => {
            tracing::warn!("Symbol error on {}: {}", session, detail);
            route(state, &session).map(|id| Packet::error(Some(id), "symbol_error", detail))
        }
        ServerMessage::StudyError { session, detail } => {
            tracing::warn!("Study error on {}: {}", session, detail);
            route(state, &session).map(|id| Packet::error(Some(id), "study_error", detail))
        }
        ServerMessage::CriticalError { session, detail } => {
            tracing::error!("Critical error: {}", detail);
            let id = session
                .filter(|s| state.table.contains(s))
                .map(|s| SessionId::from(s.as_str()));
            Some(Packet::error(id, "critical_error", detail))
        }
        ServerMessage::ProtocolError { detail } => {
            tracing::error!("Server reported a protocol error: {}", detail);
            Some(Packet::error(None, "protocol_error", detail))
        }
        ServerMessage::Unknown { method, raw } => {
            tracing::debug!("Unhandled message {}: {}", method, raw);
            None
        }
    };

    if let Some(packet) = packet {
        if !state.emit(packet).await {
            return Some(DisconnectReason::ConsumerGone);
        }
    }
    None
}

/// Map a wire session id onto a tracked session. Unmatched ids are dropped;
/// the session may have been torn down while its data was in flight.
fn route(state: &ConnTask, session: &str) -> Option<SessionId> {
    if state.table.contains(session) {
        Some(SessionId::from(session))
    } else {
        tracing::debug!("Dropping packet for unknown session {}", session);
        None
    }
}

// ─── Command dispatch ────────────────────────────────────────────────────────

async fn handle_command(
    state: &mut ConnTask,
    sink: &mut WsSink,
    cmd: Command,
) -> Option<DisconnectReason> {
    match cmd {
        Command::OpenQuote { symbols, reply } => {
            let session = Session::new(
                SessionKind::Quote,
                SessionSpec::Quote {
                    symbols,
                    fields: DEFAULT_QUOTE_FIELDS.iter().map(|f| f.to_string()).collect(),
                },
            );
            open_and_reply(state, sink, session, reply).await
        }
        Command::OpenChart {
            symbol,
            timeframe,
            reply,
        } => {
            let session = Session::new(
                SessionKind::Chart,
                SessionSpec::Chart {
                    symbol,
                    timeframe,
                    bar_count: state.config.bar_count,
                },
            );
            open_and_reply(state, sink, session, reply).await
        }
        Command::OpenStudy {
            chart,
            metadata,
            reply,
        } => {
            let live_chart = state
                .table
                .get(chart.as_str())
                .is_some_and(|s| s.kind == SessionKind::Chart);
            if !live_chart {
                let _ = reply.send(Err(SdkError::Validation(format!(
                    "no live chart session {} to attach the study to",
                    chart
                ))));
                return None;
            }
            let session = Session::new(SessionKind::Study, SessionSpec::Study { chart, metadata });
            open_and_reply(state, sink, session, reply).await
        }
        Command::AddSymbols {
            session,
            symbols,
            reply,
        } => {
            match state.table.get(session.as_str()) {
                Some(s) if s.kind == SessionKind::Quote => {}
                _ => {
                    let _ = reply.send(Err(SdkError::Validation(format!(
                        "no live quote session {}",
                        session
                    ))));
                    return None;
                }
            }
            let mut params = vec![json!(session.as_str())];
            params.extend(symbols.iter().map(|s| json!(s.as_str())));
            if let Err(e) = send_text(sink, encode_command("quote_add_symbols", &params)).await {
                let _ = reply.send(Err(WsError::SendFailed(e.clone()).into()));
                return Some(DisconnectReason::Error(e));
            }
            if let Some(s) = state.table.get_mut(session.as_str()) {
                if let SessionSpec::Quote {
                    symbols: tracked, ..
                } = &mut s.spec
                {
                    for symbol in symbols {
                        if !tracked.contains(&symbol) {
                            tracked.push(symbol);
                        }
                    }
                }
            }
            let _ = reply.send(Ok(()));
            None
        }
        Command::Close { session, reply } => {
            for closed in state.table.close(session.as_str()) {
                for text in close_commands(&closed) {
                    if let Err(e) = send_text(sink, text).await {
                        let _ = reply.send(Err(WsError::SendFailed(e.clone()).into()));
                        return Some(DisconnectReason::Error(e));
                    }
                }
                tracing::debug!("Closed session {}", closed.id);
            }
            let _ = reply.send(Ok(()));
            None
        }
        Command::Raw { method, params } => {
            if let Err(e) = send_text(sink, encode_command(&method, &params)).await {
                tracing::warn!("Send failed: {}", e);
                return Some(DisconnectReason::Error(e));
            }
            None
        }
        Command::Shutdown => {
            let ids: Vec<SessionId> = state
                .table
                .replay_order()
                .iter()
                .map(|s| s.id.clone())
                .collect();
            for id in ids {
                // Chart closes cascade, so studies seen later are already gone.
                for closed in state.table.close(id.as_str()) {
                    for text in close_commands(&closed) {
                        let _ = send_text(sink, text).await;
                    }
                }
            }
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "Client shutdown".into(),
                })))
                .await;
            Some(DisconnectReason::UserRequested)
        }
    }
}

/// Announce a new session on the wire, then register and ack it.
/// Registration happens only after every frame went out, so a half-announced
/// session is never replayed.
async fn open_and_reply(
    state: &mut ConnTask,
    sink: &mut WsSink,
    session: Session,
    reply: Reply<SessionId>,
) -> Option<DisconnectReason> {
    let id = session.id.clone();
    for text in open_commands(&session, &state.config) {
        if let Err(e) = send_text(sink, text).await {
            let _ = reply.send(Err(WsError::SendFailed(e.clone()).into()));
            return Some(DisconnectReason::Error(e));
        }
    }
    state.table.insert(session);
    tracing::debug!("Opened session {}", id);
    let _ = reply.send(Ok(id));
    None
}

// ─── Wire command sequences ──────────────────────────────────────────────────

/// Everything a session announces on open, in protocol order. Reused verbatim
/// for replay after a reconnect.
fn open_commands(session: &Session, config: &StreamConfig) -> Vec<String> {
    let id = session.id.as_str();
    match &session.spec {
        SessionSpec::Quote { symbols, fields } => {
            let mut set_fields = vec![json!(id)];
            set_fields.extend(fields.iter().map(|f| json!(f)));
            let mut add_symbols = vec![json!(id)];
            add_symbols.extend(symbols.iter().map(|s| json!(s.as_str())));
            vec![
                encode_command("quote_create_session", &[json!(id)]),
                encode_command("quote_set_fields", &set_fields),
                encode_command("quote_add_symbols", &add_symbols),
            ]
        }
        SessionSpec::Chart {
            symbol,
            timeframe,
            bar_count,
        } => vec![
            encode_command("chart_create_session", &[json!(id), json!("")]),
            encode_command("switch_timezone", &[json!(id), json!(config.timezone)]),
            encode_command(
                "resolve_symbol",
                &[json!(id), json!(SYMBOL_REF), json!(symbol_init(symbol))],
            ),
            encode_command(
                "create_series",
                &[
                    json!(id),
                    json!(SERIES_ID),
                    json!("s1"),
                    json!(SYMBOL_REF),
                    json!(timeframe.series_interval()),
                    json!(bar_count),
                    json!(""),
                ],
            ),
        ],
        SessionSpec::Study { chart, metadata } => vec![encode_command(
            "create_study",
            &[
                json!(chart.as_str()),
                json!(id),
                json!(id),
                json!(SERIES_ID),
                json!(STUDY_RUNTIME),
                metadata.study_inputs(),
            ],
        )],
    }
}

fn close_commands(session: &Session) -> Vec<String> {
    let id = session.id.as_str();
    match &session.spec {
        SessionSpec::Quote { .. } => vec![encode_command("quote_delete_session", &[json!(id)])],
        SessionSpec::Chart { .. } => vec![encode_command("chart_delete_session", &[json!(id)])],
        SessionSpec::Study { chart, .. } => vec![encode_command(
            "remove_study",
            &[json!(chart.as_str()), json!(id)],
        )],
    }
}

/// `resolve_symbol` wants the symbol wrapped in an `=`-prefixed init blob.
fn symbol_init(symbol: &Symbol) -> String {
    format!(
        "={}",
        json!({ "adjustment": "splits", "symbol": symbol.as_str() })
    )
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Establish the socket with a 30-second timeout.
///
/// The platform rejects upgrades without a browser Origin header.
async fn attempt_connect(url: &str) -> Result<(WsSink, SplitStream<WsStream>), String> {
    let mut request = url.into_client_request().map_err(|e| e.to_string())?;
    request.headers_mut().insert(
        header::ORIGIN,
        HeaderValue::from_static(crate::network::WS_ORIGIN),
    );

    let (ws_stream, _) = tokio::time::timeout(Duration::from_secs(30), connect_async(request))
        .await
        .map_err(|_| "Connection timeout".to_string())?
        .map_err(|e| e.to_string())?;

    Ok(ws_stream.split())
}

/// Send one framed command over the sink.
async fn send_text(sink: &mut WsSink, text: String) -> Result<(), String> {
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| e.to_string())
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(close: Option<&CloseFrame>) -> (u16, String) {
    match close {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1006, "No close frame".into()),
    }
}

// ─── Reconnection backoff ────────────────────────────────────────────────────

async fn backoff_sleep(state: &mut ConnTask) {
    state.reconnect_attempts += 1;

    let exp = (state.reconnect_attempts - 1).min(10);
    let base = state
        .config
        .base_reconnect_delay_ms
        .saturating_mul(1u32 << exp);
    let jitter = rand::random::<u32>() % 500;
    let delay = base
        .saturating_add(jitter)
        .min(state.config.max_reconnect_delay_ms);

    tracing::info!(
        "Reconnect attempt {} in {}ms",
        state.reconnect_attempts,
        delay
    );

    tokio::time::sleep(Duration::from_millis(delay as u64)).await;
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_commands(frames: &[String]) -> Vec<Value> {
        let mut decoder = FrameDecoder::new();
        let mut out = Vec::new();
        for text in frames {
            for item in decoder.feed(text).unwrap() {
                match item {
                    Frame::Message(body) => out.push(serde_json::from_str(&body).unwrap()),
                    Frame::Heartbeat(n) => panic!("unexpected heartbeat {n}"),
                }
            }
        }
        out
    }

    fn test_config() -> StreamConfig {
        StreamConfig {
            url: "ws://127.0.0.1:1".to_string(),
            reconnect: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_when_not_connected() {
        let (handle, _rx) = StreamHandle::connect(test_config());
        // The dial to an unroutable port cannot have completed yet.
        let result = handle.send("set_locale", vec![json!("en"), json!("US")]);
        assert!(matches!(result, Err(WsError::NotConnected)));
    }

    #[tokio::test]
    async fn test_close_when_never_connected() {
        let (mut handle, _rx) = StreamHandle::connect(test_config());
        assert!(handle.close().await.is_ok());
        assert_eq!(handle.ready_state(), ReadyState::Closed);
    }

    #[test]
    fn test_quote_open_commands() {
        let session = Session::new(
            SessionKind::Quote,
            SessionSpec::Quote {
                symbols: vec!["BINANCE:BTCUSDT".parse().unwrap()],
                fields: vec!["lp".to_string(), "ch".to_string()],
            },
        );
        let id = session.id.as_str().to_string();
        let commands = decode_commands(&open_commands(&session, &StreamConfig::default()));

        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0]["m"], "quote_create_session");
        assert_eq!(commands[0]["p"][0], id.as_str());
        assert_eq!(commands[1]["m"], "quote_set_fields");
        assert_eq!(commands[1]["p"][1], "lp");
        assert_eq!(commands[2]["m"], "quote_add_symbols");
        assert_eq!(commands[2]["p"][1], "BINANCE:BTCUSDT");
    }

    #[test]
    fn test_chart_open_commands() {
        let session = Session::new(
            SessionKind::Chart,
            SessionSpec::Chart {
                symbol: "BINANCE:ETHUSDT".parse().unwrap(),
                timeframe: Timeframe::Hour1,
                bar_count: 50,
            },
        );
        let commands = decode_commands(&open_commands(&session, &StreamConfig::default()));

        let methods: Vec<&str> = commands
            .iter()
            .map(|c| c["m"].as_str().unwrap())
            .collect();
        assert_eq!(
            methods,
            vec![
                "chart_create_session",
                "switch_timezone",
                "resolve_symbol",
                "create_series"
            ]
        );
        let init = commands[2]["p"][2].as_str().unwrap();
        assert!(init.starts_with('='));
        assert_eq!(commands[3]["p"][4], "60");
        assert_eq!(commands[3]["p"][5], 50);
    }

    #[test]
    fn test_study_open_command_targets_parent_chart() {
        let chart = SessionId::from("cs_parentchart1");
        let session = Session::new(
            SessionKind::Study,
            SessionSpec::Study {
                chart: chart.clone(),
                metadata: IndicatorMetadata::test_fixture("STD;RSI", "last"),
            },
        );
        let commands = decode_commands(&open_commands(&session, &StreamConfig::default()));

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0]["m"], "create_study");
        assert_eq!(commands[0]["p"][0], "cs_parentchart1");
        assert_eq!(commands[0]["p"][1], session.id.as_str());
        assert_eq!(commands[0]["p"][4], STUDY_RUNTIME);
        assert!(commands[0]["p"][5]["text"].is_string());
    }

    #[test]
    fn test_close_commands_per_kind() {
        let quote = Session::new(
            SessionKind::Quote,
            SessionSpec::Quote {
                symbols: vec![],
                fields: vec![],
            },
        );
        let close = decode_commands(&close_commands(&quote));
        assert_eq!(close[0]["m"], "quote_delete_session");

        let chart = SessionId::from("cs_parentchart1");
        let study = Session::new(
            SessionKind::Study,
            SessionSpec::Study {
                chart: chart.clone(),
                metadata: IndicatorMetadata::test_fixture("STD;RSI", "last"),
            },
        );
        let close = decode_commands(&close_commands(&study));
        assert_eq!(close[0]["m"], "remove_study");
        assert_eq!(close[0]["p"][0], "cs_parentchart1");
        assert_eq!(close[0]["p"][1], study.id.as_str());
    }

    #[test]
    fn test_symbol_init_format() {
        let symbol: Symbol = "NASDAQ:AAPL".parse().unwrap();
        let init = symbol_init(&symbol);
        let blob: Value = serde_json::from_str(&init[1..]).unwrap();
        assert_eq!(blob["symbol"], "NASDAQ:AAPL");
        assert_eq!(blob["adjustment"], "splits");
    }

    #[test]
    fn test_extract_close_with_frame() {
        let close = CloseFrame {
            code: CloseCode::Normal,
            reason: "goodbye".into(),
        };
        let (code, reason) = extract_close(Some(&close));
        assert_eq!(code, 1000);
        assert_eq!(reason, "goodbye");
    }

    #[test]
    fn test_extract_close_no_frame() {
        let (code, reason) = extract_close(None);
        assert_eq!(code, 1006);
        assert_eq!(reason, "No close frame");
    }

    #[test]
    fn test_should_reconnect_limits() {
        let (packet_tx, _packet_rx) = mpsc::channel(1);
        let (_cmd_tx, cmd_rx) = mpsc::channel(1);
        let mut state = ConnTask {
            config: StreamConfig::default(),
            packet_tx,
            cmd_rx,
            table: SessionTable::new(),
            reconnect_attempts: 0,
            ready_state: Arc::new(AtomicU16::new(ReadyState::Closed as u16)),
        };

        // Default: unlimited retries.
        state.reconnect_attempts = 10_000;
        assert!(state.should_reconnect());

        state.config.max_reconnect_attempts = 3;
        state.reconnect_attempts = 2;
        assert!(state.should_reconnect());
        state.reconnect_attempts = 3;
        assert!(!state.should_reconnect());

        state.config.reconnect = false;
        state.reconnect_attempts = 0;
        assert!(!state.should_reconnect());
    }
}
