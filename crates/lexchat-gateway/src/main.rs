//! lexchat gateway: dashboard for chatting with an Amazon Lex V2 bot.
//! Config from `.env` / `config/lexchat.toml` / environment; see `lexchat_core::config`.

use lexchat_core::{ConversationClient, LexChatConfig, LexClient, SdkLexClient};
use lexchat_gateway::{app, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = LexChatConfig::load()?;
    let missing = config.bot.missing_fields();
    if !missing.is_empty() {
        tracing::warn!(
            ?missing,
            "bot defaults incomplete; set BOT_ID etc. or use the Update form"
        );
    }

    let client: Arc<dyn ConversationClient> = match config.lex_endpoint_override() {
        Some(endpoint) => {
            tracing::warn!(%endpoint, "lex_endpoint set: requests go out unsigned over plain HTTP");
            Arc::new(LexClient::with_endpoint(endpoint))
        }
        None => Arc::new(SdkLexClient::from_env(&config.bot.region).await),
    };
    tracing::info!(
        region = %config.bot.region,
        bot_id = %config.bot.bot_id,
        bot_alias_id = %config.bot.bot_alias_id,
        locale_id = %config.bot.locale_id,
        "Lex runtime client ready"
    );

    let addr = config.bind_addr();
    let state = AppState::new(config, client);
    let _sweeper = state.spawn_session_sweeper();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("lexchat dashboard on http://{}", addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
