//! Chat turns: submit text, call the bot off the request path, record the result.
//!
//! `begin_turn` records the user message and marks the session pending. The Lex call runs in
//! `run_turn` (usually via `spawn_turn`), and `complete_turn` appends the audit entry and the
//! assistant message together so the two logs never drift apart.

use crate::config::BotConfig;
use crate::error::TurnError;
use crate::lex_client::{ConversationClient, LexReply, RecognizeTextRequest, LEX_SESSION_ID};
use crate::session::{clock_timestamp, AuditEntry, ChatMessage, SessionId, SessionStore, TurnState};
use chrono::Local;
use std::sync::Arc;

/// A turn that has been recorded but not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub session_id: SessionId,
    pub request: RecognizeTextRequest,
    pub submitted_at: String,
}

/// Record the user's message and move the session to pending.
pub fn begin_turn(
    store: &SessionStore,
    session_id: &str,
    text: &str,
    defaults: &BotConfig,
) -> Result<PendingTurn, TurnError> {
    if text.trim().is_empty() {
        return Err(TurnError::EmptyMessage);
    }

    store
        .with_session_mut(session_id, |session| {
            if session.turn_state().is_pending() {
                return Err(TurnError::TurnInFlight);
            }
            let submitted_at = clock_timestamp(Local::now());
            session.append_message(ChatMessage::user(text, submitted_at.clone()));

            let bot = session.effective_config(defaults);
            let request = RecognizeTextRequest {
                bot_id: bot.bot_id,
                bot_alias_id: bot.bot_alias_id,
                locale_id: bot.locale_id,
                session_id: LEX_SESSION_ID.to_string(),
                text: text.to_string(),
            };
            session.set_turn_state(TurnState::Pending {
                submitted_at: submitted_at.clone(),
            });
            Ok(PendingTurn {
                session_id: session_id.to_string(),
                request,
                submitted_at,
            })
        })
        .ok_or_else(|| TurnError::SessionNotFound(session_id.to_string()))?
}

/// Append the audit entry and the assistant reply, then settle the turn state.
/// Returns false when the session vanished while the call was in flight.
pub fn complete_turn(
    store: &SessionStore,
    pending: PendingTurn,
    reply: LexReply,
    placeholder: &str,
) -> bool {
    let answered_at = clock_timestamp(Local::now());
    let text = reply.reply_text(placeholder);
    let error = reply.error().map(str::to_string);
    let PendingTurn {
        session_id,
        request,
        submitted_at,
    } = pending;

    let recorded = store.with_session_mut(&session_id, |session| {
        session.append_audit_entry(AuditEntry {
            timestamp: submitted_at,
            request,
            response: reply,
        });
        let message = ChatMessage::assistant(text, answered_at);
        match error {
            Some(e) => {
                session.append_message(message.with_error(e.clone()));
                session.set_turn_state(TurnState::Failed { error: e });
            }
            None => {
                session.append_message(message);
                session.set_turn_state(TurnState::Resolved);
            }
        }
    });

    if recorded.is_none() {
        tracing::warn!(session = %session_id, "session gone before reply arrived; dropping it");
    }
    recorded.is_some()
}

/// Call the bot and record the outcome.
pub async fn run_turn(
    store: &SessionStore,
    client: &dyn ConversationClient,
    pending: PendingTurn,
    placeholder: &str,
) -> bool {
    tracing::info!(
        session = %pending.session_id,
        bot_id = %pending.request.bot_id,
        bot_alias_id = %pending.request.bot_alias_id,
        "sending turn to Lex"
    );
    let reply = client.send_message(&pending.request).await;
    if let Some(e) = reply.error() {
        tracing::warn!(session = %pending.session_id, error = %e, "turn failed");
    } else {
        tracing::info!(session = %pending.session_id, "turn answered");
    }
    complete_turn(store, pending, reply, placeholder)
}

/// `run_turn` on the tokio runtime so the caller can return to the browser immediately.
pub fn spawn_turn(
    store: SessionStore,
    client: Arc<dyn ConversationClient>,
    pending: PendingTurn,
    placeholder: String,
) -> tokio::task::JoinHandle<bool> {
    tokio::spawn(async move { run_turn(&store, client.as_ref(), pending, &placeholder).await })
}
