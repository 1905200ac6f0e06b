//! Gateway and bot configuration.
//!
//! | Source | Example | Notes |
//! |--------|---------|-------|
//! | built-in defaults | `region = us-east-1` | see `DEFAULT_*` constants |
//! | TOML file | `config/lexchat.toml` | path from `LEXCHAT_CONFIG`, optional |
//! | prefixed env | `LEXCHAT__PORT=9000`, `LEXCHAT__BOT__LOCALE_ID=en_GB` | `__` separates nesting |
//! | prefixed env | `LEXCHAT__SESSION_IDLE_SECS=1800` | idle sessions are evicted after this |
//! | plain env | `BOT_ID`, `BOT_ALIAS_ID`, `LOCALE_ID`, `AWS_REGION` | highest precedence |
//!
//! Loaded once at startup; there is no reload.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_APP_NAME: &str = "AWS Lex Chatbot";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8501;
/// Lex V2 built-in alias that points at the draft bot version.
pub const DEFAULT_BOT_ALIAS_ID: &str = "TSTALIASID";
pub const DEFAULT_LOCALE_ID: &str = "en_US";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_NO_RESPONSE_TEXT: &str = "No response";
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;
pub const DEFAULT_SESSION_SWEEP_SECS: u64 = 60;

const CONFIG_PATH_VAR: &str = "LEXCHAT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/lexchat";

/// Which Lex bot, alias and locale a turn is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    pub bot_id: String,
    pub bot_alias_id: String,
    pub locale_id: String,
    pub region: String,
}

impl BotConfig {
    /// Names of identifiers that are empty. Presence is the only validation applied.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("bot_id", &self.bot_id),
            ("bot_alias_id", &self.bot_alias_id),
            ("locale_id", &self.locale_id),
            ("region", &self.region),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Full gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexChatConfig {
    /// Page title.
    pub app_name: String,
    pub host: String,
    pub port: u16,
    /// Static bot defaults; a session override replaces bot/alias ids.
    pub bot: BotConfig,
    /// Unsigned plain-HTTP target (signing proxy, local stub). Unset means the AWS SDK client.
    #[serde(default)]
    pub lex_endpoint: Option<String>,
    /// Assistant text shown when the reply carries no message.
    pub no_response_text: String,
    /// A session not seen for this long is dropped from the store.
    pub session_idle_secs: u64,
    pub session_sweep_secs: u64,
}

impl LexChatConfig {
    /// Load from the process environment (call `dotenvy::dotenv()` first if `.env` should apply).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(std::env::vars().collect())
    }

    /// Load with an explicit environment map instead of the process environment.
    pub fn load_from(env: HashMap<String, String>) -> Result<Self, ConfigError> {
        let config_path = env
            .get(CONFIG_PATH_VAR)
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let built = config::Config::builder()
            .set_default("app_name", DEFAULT_APP_NAME)?
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("bot.bot_id", "")?
            .set_default("bot.bot_alias_id", DEFAULT_BOT_ALIAS_ID)?
            .set_default("bot.locale_id", DEFAULT_LOCALE_ID)?
            .set_default("bot.region", DEFAULT_REGION)?
            .set_default("no_response_text", DEFAULT_NO_RESPONSE_TEXT)?
            .set_default("session_idle_secs", DEFAULT_SESSION_IDLE_SECS)?
            .set_default("session_sweep_secs", DEFAULT_SESSION_SWEEP_SECS)?
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(
                config::Environment::with_prefix("LEXCHAT")
                    .separator("__")
                    .source(Some(env.clone())),
            )
            .set_override_option("bot.bot_id", non_empty(&env, "BOT_ID"))?
            .set_override_option("bot.bot_alias_id", non_empty(&env, "BOT_ALIAS_ID"))?
            .set_override_option("bot.locale_id", non_empty(&env, "LOCALE_ID"))?
            .set_override_option("bot.region", non_empty(&env, "AWS_REGION"))?
            .build()?;

        Ok(built.try_deserialize()?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `lex_endpoint` when it is set and non-blank.
    pub fn lex_endpoint_override(&self) -> Option<&str> {
        self.lex_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// Sweep period, at least one second.
    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_secs.max(1))
    }
}

fn non_empty(env: &HashMap<String, String>, name: &str) -> Option<String> {
    env.get(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
