//! HTTP routes. Form posts redirect back to `/` so a browser refresh never resubmits.

use crate::render::{render_page, DashboardView, CONFIG_UPDATED_FLASH};
use crate::AppState;
use axum::{
    body::Body,
    extract::{Form, Query, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use lexchat_core::{begin_turn, spawn_turn, BotOverride, TurnError};
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Browser-session cookie carrying the lexchat session id. No Max-Age, so it dies with the browser session.
pub const SESSION_COOKIE: &str = "lexchat_sid";

#[derive(Deserialize, Default)]
pub struct DashboardQuery {
    #[serde(default)]
    updated: Option<String>,
}

#[derive(Deserialize)]
pub struct ConfigForm {
    #[serde(default)]
    bot_id: String,
    #[serde(default)]
    bot_alias_id: String,
}

#[derive(Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    message: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/config", post(update_config))
        .route("/chat", post(submit_chat))
        .route("/api/v1/session", get(session_json))
        .route("/health", get(health))
        .with_state(state)
        .layer(axum::middleware::from_fn(log_requests))
}

async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = elapsed_ms(started.elapsed()),
        "request"
    );
    response
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

async fn health() -> &'static str {
    "OK"
}

/// Dashboard: config header, debug panel, chat panel.
async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let (sid, created) = state.sessions.get_or_create(session_cookie(&headers).as_deref());
    let Some(session) = state.sessions.snapshot(&sid) else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "session disappeared").into_response();
    };
    let bot = session.effective_config(&state.config.bot);
    let flash = query.updated.is_some().then_some(CONFIG_UPDATED_FLASH);

    let html = render_page(&DashboardView {
        app_name: &state.config.app_name,
        session: &session,
        bot: &bot,
        flash,
    });
    with_session_cookie(Html(html).into_response(), &sid, created)
}

/// "Update" button: store bot/alias override for this browser session.
async fn update_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ConfigForm>,
) -> Response {
    let (sid, created) = state.sessions.get_or_create(session_cookie(&headers).as_deref());
    let value = BotOverride {
        bot_id: form.bot_id.trim().to_string(),
        bot_alias_id: form.bot_alias_id.trim().to_string(),
    };
    if !value.is_active() {
        tracing::warn!(session = %sid, "override with blank bot or alias id is ignored until both are set");
    }
    tracing::info!(session = %sid, bot_id = %value.bot_id, bot_alias_id = %value.bot_alias_id, "bot configuration updated");
    state
        .sessions
        .with_session_mut(&sid, |s| s.set_config_override(value));
    with_session_cookie(Redirect::to("/?updated=1").into_response(), &sid, created)
}

/// Chat input: record the message, hand the Lex call to a background task, redirect.
async fn submit_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ChatForm>,
) -> Response {
    let (sid, created) = state.sessions.get_or_create(session_cookie(&headers).as_deref());

    match begin_turn(&state.sessions, &sid, &form.message, &state.config.bot) {
        Ok(pending) => {
            spawn_turn(
                state.sessions.clone(),
                state.client.clone(),
                pending,
                state.config.no_response_text.clone(),
            );
        }
        Err(TurnError::EmptyMessage) => {}
        Err(e @ TurnError::TurnInFlight) => {
            return with_session_cookie((StatusCode::CONFLICT, e.to_string()).into_response(), &sid, created);
        }
        Err(e @ TurnError::SessionNotFound(_)) => {
            tracing::error!(session = %sid, error = %e, "session missing right after creation");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    }
    with_session_cookie(Redirect::to("/").into_response(), &sid, created)
}

/// Raw session state for debugging and scripted checks.
async fn session_json(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let sid = session_cookie(&headers)
        .ok_or((StatusCode::NOT_FOUND, "no session cookie".to_string()))?;
    let session = state
        .sessions
        .snapshot(&sid)
        .ok_or((StatusCode::NOT_FOUND, format!("unknown session: {}", sid)))?;

    Ok(Json(serde_json::json!({
        "session_id": sid,
        "turn": session.turn_state(),
        "effective_config": session.effective_config(&state.config.bot),
        "config_override": session.config_override(),
        "messages": session.messages(),
        "audit": session.audit(),
    })))
}

/// Value of the `lexchat_sid` cookie, if the browser sent one.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn with_session_cookie(mut response: Response, sid: &str, created: bool) -> Response {
    if created {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, sid);
        match HeaderValue::from_str(&cookie) {
            Ok(v) => {
                response.headers_mut().append(header::SET_COOKIE, v);
            }
            Err(e) => tracing::error!(error = %e, "session cookie not representable as a header"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; lexchat_sid=abc-123 ; other=1"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn missing_or_empty_cookie_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_cookie(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("lexchat_sid="));
        assert_eq!(session_cookie(&headers), None);
    }

    #[test]
    fn elapsed_ms_saturates_instead_of_wrapping() {
        assert_eq!(elapsed_ms(Duration::from_millis(1234)), 1234);
        assert_eq!(elapsed_ms(Duration::MAX), u64::MAX);
    }
}
