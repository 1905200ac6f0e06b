//! lexchat core library.
//! Bot configuration, the Lex V2 runtime client, and per-session chat state for the gateway.

pub mod config;
pub mod error;
pub mod lex_client;
pub mod sdk_client;
pub mod session;
pub mod turn;

pub use config::{BotConfig, LexChatConfig};
pub use error::{ConfigError, LexError, TurnError};
pub use lex_client::{
    ConversationClient, LexClient, LexMessage, LexReply, RecognizeTextRequest, RecognizeTextResponse,
    LEX_SESSION_ID,
};
pub use sdk_client::SdkLexClient;
pub use session::{
    spawn_sweeper, AuditEntry, BotOverride, ChatMessage, Role, Session, SessionId, SessionStore,
    TurnState,
};
pub use turn::{begin_turn, complete_turn, run_turn, spawn_turn, PendingTurn};
