//! Per-browser-session chat context and the store that holds them.
//!
//! A [`Session`] owns one operator's transcript, audit log, bot override and turn state.
//! [`SessionStore`] maps session ids to sessions; nothing is shared between sessions and
//! nothing outlives the process. Sessions whose cookie has not been seen for the idle limit
//! are evicted by [`spawn_sweeper`].

use crate::config::BotConfig;
use crate::lex_client::{LexReply, RecognizeTextRequest};
use chrono::{DateTime, Local};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Wall-clock `HH:MM:SS`, the format shown next to every message and audit entry.
pub fn clock_timestamp(at: DateTime<Local>) -> String {
    at.format("%H:%M:%S").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    /// Set on assistant messages whose remote call failed; `content` is then the placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: timestamp.into(),
            error: None,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: timestamp.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// One request/response round trip, kept for the debug panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub request: RecognizeTextRequest,
    pub response: LexReply,
}

/// Bot/alias ids entered through the dashboard form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotOverride {
    pub bot_id: String,
    pub bot_alias_id: String,
}

impl BotOverride {
    /// Takes effect only when both ids are non-blank.
    pub fn is_active(&self) -> bool {
        !self.bot_id.trim().is_empty() && !self.bot_alias_id.trim().is_empty()
    }
}

/// idle → pending → resolved | failed → pending → ...
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Pending { submitted_at: String },
    Resolved,
    Failed { error: String },
}

impl TurnState {
    pub fn is_pending(&self) -> bool {
        matches!(self, TurnState::Pending { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    messages: Vec<ChatMessage>,
    audit: Vec<AuditEntry>,
    config_override: Option<BotOverride>,
    turn: TurnState,
    #[serde(skip, default = "Instant::now")]
    last_seen: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            audit: Vec::new(),
            config_override: None,
            turn: TurnState::Idle,
            last_seen: Instant::now(),
        }
    }

    pub fn append_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn append_audit_entry(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }

    /// Transcript in submission order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Audit log in insertion order.
    pub fn audit(&self) -> &[AuditEntry] {
        &self.audit
    }

    /// Audit log as the debug panel shows it.
    pub fn audit_newest_first(&self) -> impl Iterator<Item = &AuditEntry> {
        self.audit.iter().rev()
    }

    pub fn config_override(&self) -> Option<&BotOverride> {
        self.config_override.as_ref()
    }

    /// Stores the override. One with a blank field is stored but ignored by `effective_config`.
    pub fn set_config_override(&mut self, value: BotOverride) {
        self.config_override = Some(value);
    }

    /// `defaults` with the bot/alias ids replaced by an active override.
    pub fn effective_config(&self, defaults: &BotConfig) -> BotConfig {
        match self.config_override.as_ref().filter(|o| o.is_active()) {
            Some(o) => BotConfig {
                bot_id: o.bot_id.trim().to_string(),
                bot_alias_id: o.bot_alias_id.trim().to_string(),
                ..defaults.clone()
            },
            None => defaults.clone(),
        }
    }

    pub fn turn_state(&self) -> &TurnState {
        &self.turn
    }

    pub(crate) fn set_turn_state(&mut self, state: TurnState) {
        self.turn = state;
    }

    /// Last time the browser presented this session's cookie.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}

pub type SessionId = String;

/// Live sessions keyed by browser session id.
#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<SessionId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh empty session under a new UUID.
    pub fn create(&self) -> SessionId {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), Session::new());
        tracing::debug!(session = %id, "session created");
        id
    }

    /// Existing session for `id` (marked as seen), or a new one. The flag is true when a
    /// session was created.
    pub fn get_or_create(&self, id: Option<&str>) -> (SessionId, bool) {
        if let Some(id) = id {
            if let Some(mut session) = self.sessions.get_mut(id) {
                session.touch();
                return (id.to_string(), false);
            }
        }
        (self.create(), true)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Read access. The shard lock is held for the closure only; do not await inside it.
    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&Session) -> R) -> Option<R> {
        self.sessions.get(id).map(|s| f(s.value()))
    }

    /// Write access. Same locking rule as `with_session`.
    pub fn with_session_mut<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions.get_mut(id).map(|mut s| f(s.value_mut()))
    }

    /// Owned copy for rendering.
    pub fn snapshot(&self, id: &str) -> Option<Session> {
        self.with_session(id, Session::clone)
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.remove(id).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops sessions unseen for at least `max_idle`. A session with a turn in flight is kept.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.evict_idle_at(Instant::now(), max_idle)
    }

    /// `evict_idle` measured from `now`.
    pub fn evict_idle_at(&self, now: Instant, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| {
            s.turn.is_pending() || now.saturating_duration_since(s.last_seen) < max_idle
        });
        before.saturating_sub(self.sessions.len())
    }
}

/// Periodically evicts idle sessions from `store`. Runs until the handle is aborted.
pub fn spawn_sweeper(store: SessionStore, every: Duration, max_idle: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = store.evict_idle(max_idle);
            if evicted > 0 {
                tracing::info!(evicted, remaining = store.len(), "idle sessions evicted");
            }
        }
    })
}
