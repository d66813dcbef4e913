//! Inbound message classification.
//!
//! Every decoded frame body passes through [`parse`], which maps it onto a
//! closed set of server message shapes. Anything outside the set lands in
//! [`ServerMessage::Unknown`]; the connection task logs and drops those
//! instead of failing the stream. Routing works off the session id the
//! server embeds in `p[0]`.

use serde_json::Value;

/// One classified server message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// The first frame after connect: connection info without an `m` field.
    Hello { info: Value },
    /// `qsd` — quote field update for a quote session.
    QuoteData { session: String, payload: Value },
    /// `du` / `timescale_update` — series rows for a chart session.
    /// `method` keeps the wire name so consumers can tell initial history
    /// from incremental updates.
    ChartData {
        session: String,
        method: String,
        payload: Value,
    },
    /// `study` — computed indicator rows for a study session.
    StudyData { session: String, payload: Value },
    /// `quote_completed` — a symbol finished loading into a quote session.
    QuoteCompleted {
        session: String,
        symbol: Option<String>,
    },
    /// `series_completed` — chart series finished its initial load.
    SeriesCompleted { session: String },
    /// `study_completed` — study finished applying to its series.
    StudyCompleted { session: String },
    /// `symbol_error` — the server rejected a symbol on this session.
    SymbolError { session: String, detail: Value },
    /// `study_error` — the server rejected or aborted a study.
    StudyError { session: String, detail: Value },
    /// `critical_error` — the server is abandoning the session or connection.
    CriticalError {
        session: Option<String>,
        detail: Value,
    },
    /// `protocol_error` — the server rejected something we sent.
    ProtocolError { detail: Value },
    /// Any shape not in the closed set above.
    Unknown { method: String, raw: Value },
}

/// Classify one frame body.
///
/// Total: malformed input becomes `Unknown`, never an error.
pub fn parse(text: &str) -> ServerMessage {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return ServerMessage::Unknown {
            method: String::new(),
            raw: Value::String(text.to_string()),
        };
    };
    if !value.is_object() {
        return ServerMessage::Unknown {
            method: String::new(),
            raw: value,
        };
    }

    let Some(method) = value.get("m").and_then(|m| m.as_str()).map(str::to_string) else {
        return ServerMessage::Hello { info: value };
    };

    let params = value.get("p").cloned().unwrap_or(Value::Null);
    let session = params
        .get(0)
        .and_then(|s| s.as_str())
        .map(str::to_string);
    let payload = || params.get(1).cloned().unwrap_or(Value::Null);

    match (method.as_str(), session) {
        ("qsd", Some(session)) => ServerMessage::QuoteData {
            session,
            payload: payload(),
        },
        ("du" | "timescale_update", Some(session)) => ServerMessage::ChartData {
            session,
            method: method.clone(),
            payload: payload(),
        },
        ("study", Some(session)) => ServerMessage::StudyData {
            session,
            payload: payload(),
        },
        ("quote_completed", Some(session)) => ServerMessage::QuoteCompleted {
            session,
            symbol: params.get(1).and_then(|s| s.as_str()).map(str::to_string),
        },
        ("series_completed", Some(session)) => ServerMessage::SeriesCompleted { session },
        ("study_completed", Some(session)) => ServerMessage::StudyCompleted { session },
        ("symbol_error", Some(session)) => ServerMessage::SymbolError {
            session,
            detail: params.clone(),
        },
        ("study_error", Some(session)) => ServerMessage::StudyError {
            session,
            detail: params.clone(),
        },
        ("critical_error", session) => ServerMessage::CriticalError {
            session,
            detail: params.clone(),
        },
        ("protocol_error", _) => ServerMessage::ProtocolError {
            detail: params.clone(),
        },
        _ => ServerMessage::Unknown {
            method: method.clone(),
            raw: value,
        },
    }
}
