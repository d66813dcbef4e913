//! Logical session records multiplexed over one connection.
//!
//! The connection task owns a [`SessionTable`]; nothing else mutates it.
//! Ids are generated locally, the server never assigns them. The table keeps
//! creation order so a reconnect can replay every live session exactly the
//! way it was first announced.

use crate::domain::indicator::IndicatorMetadata;
use crate::shared::{Symbol, Timeframe};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Length of the random id suffix, matching the platform's own clients.
const SESSION_SUFFIX_LEN: usize = 12;
const SESSION_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

// ─── SessionId ───────────────────────────────────────────────────────────────

/// Locally-generated session identifier, e.g. `"qs_h2n4x0k9p3ma"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub(crate) fn generate(kind: SessionKind) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SESSION_SUFFIX_LEN)
            .map(|_| SESSION_CHARSET[rng.gen_range(0..SESSION_CHARSET.len())] as char)
            .collect();
        Self(format!("{}_{}", kind.prefix(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Serialize for SessionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(SessionId(s))
    }
}

// ─── Kind and state ──────────────────────────────────────────────────────────

/// The three logical session kinds the protocol multiplexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Quote,
    Chart,
    Study,
}

impl SessionKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Quote => "qs",
            Self::Chart => "cs",
            Self::Study => "st",
        }
    }
}

/// Session lifecycle.
///
/// `Active { confirmed: false }` marks a session whose ack never arrived
/// within the ack window; data is still accepted, since the server may
/// stream before acknowledging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending { since: Instant },
    Active { confirmed: bool },
    Closed,
}

/// Per-kind subscription payload, everything needed to replay the session.
#[derive(Debug, Clone)]
pub enum SessionSpec {
    Quote {
        symbols: Vec<Symbol>,
        fields: Vec<String>,
    },
    Chart {
        symbol: Symbol,
        timeframe: Timeframe,
        bar_count: u32,
    },
    Study {
        chart: SessionId,
        metadata: IndicatorMetadata,
    },
}

/// One tracked session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub kind: SessionKind,
    pub state: SessionState,
    pub spec: SessionSpec,
}

impl Session {
    pub fn new(kind: SessionKind, spec: SessionSpec) -> Self {
        Self {
            id: SessionId::generate(kind),
            kind,
            state: SessionState::Pending {
                since: Instant::now(),
            },
            spec,
        }
    }

    /// Parent chart session id, for study sessions only.
    pub fn parent(&self) -> Option<&SessionId> {
        match &self.spec {
            SessionSpec::Study { chart, .. } => Some(chart),
            _ => None,
        }
    }
}

// ─── SessionTable ────────────────────────────────────────────────────────────

/// All live sessions on one connection, in creation order.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<String, Session>,
    order: Vec<SessionId>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn insert(&mut self, session: Session) {
        self.order.push(session.id.clone());
        self.sessions.insert(session.id.as_str().to_string(), session);
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Ids of study sessions attached to `chart`, in creation order.
    pub fn studies_of(&self, chart: &SessionId) -> Vec<SessionId> {
        self.order
            .iter()
            .filter(|id| {
                self.sessions
                    .get(id.as_str())
                    .and_then(|s| s.parent())
                    .is_some_and(|p| p == chart)
            })
            .cloned()
            .collect()
    }

    /// Remove a session, cascading chart closes onto dependent studies.
    ///
    /// Returns the removed sessions, children before parents, so delete
    /// commands can be sent in that order. Unknown or already-closed ids
    /// return an empty vec; close is idempotent.
    pub fn close(&mut self, id: &str) -> Vec<Session> {
        let Some(target) = self.sessions.get(id) else {
            return Vec::new();
        };

        let mut ids = Vec::new();
        if target.kind == SessionKind::Chart {
            ids.extend(self.studies_of(&target.id));
        }
        ids.push(target.id.clone());

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(mut session) = self.sessions.remove(id.as_str()) {
                session.state = SessionState::Closed;
                self.order.retain(|o| o != &id);
                removed.push(session);
            }
        }
        removed
    }

    /// Mark a session confirmed after its ack arrived.
    pub fn confirm(&mut self, id: &str) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.state = SessionState::Active { confirmed: true };
        }
    }

    /// Promote sessions stuck in `Pending` past `ack_timeout` to unconfirmed
    /// active, returning their ids for logging.
    pub fn sweep_pending(&mut self, ack_timeout: Duration) -> Vec<SessionId> {
        let mut promoted = Vec::new();
        for session in self.sessions.values_mut() {
            if let SessionState::Pending { since } = session.state {
                if since.elapsed() >= ack_timeout {
                    session.state = SessionState::Active { confirmed: false };
                    promoted.push(session.id.clone());
                }
            }
        }
        promoted
    }

    /// Reset every session to `Pending` for a fresh connection epoch.
    pub fn mark_all_pending(&mut self) {
        let now = Instant::now();
        for session in self.sessions.values_mut() {
            session.state = SessionState::Pending { since: now };
        }
    }

    /// Sessions in replay order: quote and chart sessions in creation order,
    /// then study sessions in creation order, so every study's parent chart
    /// is announced before the study itself.
    pub fn replay_order(&self) -> Vec<&Session> {
        let mut out: Vec<&Session> = Vec::with_capacity(self.order.len());
        for id in &self.order {
            if let Some(s) = self.sessions.get(id.as_str()) {
                if s.kind != SessionKind::Study {
                    out.push(s);
                }
            }
        }
        for id in &self.order {
            if let Some(s) = self.sessions.get(id.as_str()) {
                if s.kind == SessionKind::Study {
                    out.push(s);
                }
            }
        }
        out
    }
}
