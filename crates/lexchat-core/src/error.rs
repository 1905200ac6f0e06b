//! Error types for lexchat.

use thiserror::Error;

/// Failure of a single RecognizeText call.
#[derive(Error, Debug)]
pub enum LexError {
    #[error("Lex request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Lex endpoint is not a valid base URL: {0}")]
    Endpoint(String),

    #[error("Lex runtime returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Lex response parse failed: {0}")]
    Decode(String),

    #[error("Lex runtime call failed: {0}")]
    Sdk(String),
}

/// Reasons a chat turn cannot start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    #[error("unknown session: {0}")]
    SessionNotFound(String),

    #[error("message is empty")]
    EmptyMessage,

    #[error("a message is already awaiting a reply")]
    TurnInFlight,
}

/// Configuration could not be assembled from its sources.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}
