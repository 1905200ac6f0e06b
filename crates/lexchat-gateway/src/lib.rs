//! lexchat gateway: dashboard routes and shared state. `main.rs` only boots it.

pub mod render;
pub mod routes;

use lexchat_core::{spawn_sweeper, ConversationClient, LexChatConfig, SessionStore};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LexChatConfig>,
    pub sessions: SessionStore,
    pub client: Arc<dyn ConversationClient>,
}

impl AppState {
    pub fn new(config: LexChatConfig, client: Arc<dyn ConversationClient>) -> Self {
        Self {
            config: Arc::new(config),
            sessions: SessionStore::new(),
            client,
        }
    }

    /// Background eviction of sessions idle past `session_idle_secs`.
    pub fn spawn_session_sweeper(&self) -> JoinHandle<()> {
        spawn_sweeper(
            self.sessions.clone(),
            self.config.session_sweep_interval(),
            self.config.session_idle(),
        )
    }
}

pub use routes::{app, SESSION_COOKIE};
