//! Dashboard HTML: config header, request/response history, chat panel.
//! Everything is rendered server-side from a session snapshot on each request.

use lexchat_core::{AuditEntry, BotConfig, ChatMessage, Session, TurnState};

/// Seconds between self-refreshes while a reply is outstanding.
const PENDING_REFRESH_SECS: u32 = 1;

pub const CONFIG_UPDATED_FLASH: &str = "Bot configuration updated!";

/// Everything one page render needs.
pub struct DashboardView<'a> {
    pub app_name: &'a str,
    pub session: &'a Session,
    /// Defaults with the session override applied.
    pub bot: &'a BotConfig,
    pub flash: Option<&'a str>,
}

pub fn render_page(view: &DashboardView<'_>) -> String {
    let pending = view.session.turn_state().is_pending();
    let refresh = if pending {
        format!(
            r#"<meta http-equiv="refresh" content="{}">"#,
            PENDING_REFRESH_SECS
        )
    } else {
        String::new()
    };

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
{refresh}
<title>{title}</title>
<style>{css}</style>
</head>
<body>
<h1>{title}</h1>
{header}
<div class="columns">
<section class="panel debug">{debug}</section>
<section class="panel chat">{chat}</section>
</div>
</body>
</html>
"#,
        refresh = refresh,
        title = html_escape(view.app_name),
        css = STYLE,
        header = render_header(view.bot, view.flash),
        debug = render_debug_panel(view.session),
        chat = render_chat_panel(view.session),
    )
}

fn render_header(bot: &BotConfig, flash: Option<&str>) -> String {
    let flash_html = flash
        .map(|msg| format!(r#"<div class="flash">{}</div>"#, html_escape(msg)))
        .unwrap_or_default();
    format!(
        r#"<form class="header-container" method="post" action="/config">
<label>Bot ID <input type="text" name="bot_id" value="{bot_id}"></label>
<label>Bot Alias ID <input type="text" name="bot_alias_id" value="{alias}"></label>
<button type="submit">Update</button>
<span class="meta">locale {locale} · region {region}</span>
</form>
{flash}"#,
        bot_id = html_escape(&bot.bot_id),
        alias = html_escape(&bot.bot_alias_id),
        locale = html_escape(&bot.locale_id),
        region = html_escape(&bot.region),
        flash = flash_html,
    )
}

fn render_debug_panel(session: &Session) -> String {
    let mut html = String::from("<h3>Request/Response History</h3>\n<div class=\"scroll\">\n");
    for entry in session.audit_newest_first() {
        html.push_str(&render_audit_entry(entry));
    }
    html.push_str("</div>");
    html
}

fn render_audit_entry(entry: &AuditEntry) -> String {
    let status = if entry.response.is_error() {
        r#" <span class="badge error">error</span>"#
    } else {
        ""
    };
    format!(
        r#"<div class="audit-entry">
<p><strong>Time: {time}</strong>{status}</p>
<p><strong>Request:</strong></p>
<pre><code class="language-json">{request}</code></pre>
<p><strong>Response:</strong></p>
<pre><code class="language-json">{response}</code></pre>
<hr>
</div>
"#,
        time = html_escape(&entry.timestamp),
        status = status,
        request = html_escape(&pretty_json(&entry.request)),
        response = html_escape(&pretty_json(&entry.response)),
    )
}

fn render_chat_panel(session: &Session) -> String {
    let mut html = String::from("<h3>Chat Interface</h3>\n<div class=\"scroll messages\">\n");
    for message in session.messages() {
        html.push_str(&render_message(message));
    }
    html.push_str("</div>\n");
    html.push_str(&render_turn_status(session.turn_state()));

    let disabled = if session.turn_state().is_pending() {
        " disabled"
    } else {
        ""
    };
    html.push_str(&format!(
        r#"<form class="chat-input" method="post" action="/chat">
<input type="text" name="message" placeholder="Type your message here..." autocomplete="off" autofocus{d}>
<button type="submit"{d}>Send</button>
</form>"#,
        d = disabled
    ));
    html
}

fn render_message(message: &ChatMessage) -> String {
    let error = message
        .error
        .as_deref()
        .map(|e| {
            format!(
                r#"<div class="msg-error">Bot call failed: {}</div>"#,
                html_escape(e)
            )
        })
        .unwrap_or_default();
    let role = message.role.as_str();
    let failed = if message.error.is_some() { " failed" } else { "" };
    format!(
        r#"<div class="msg {role}{failed}"><div class="stamp"><strong>{time}</strong></div><div class="content">{content}</div>{error}</div>
"#,
        role = role,
        failed = failed,
        time = html_escape(&message.timestamp),
        content = html_escape(&message.content),
        error = error,
    )
}

fn render_turn_status(state: &TurnState) -> String {
    match state {
        TurnState::Pending { submitted_at } => format!(
            r#"<div class="turn-status pending">Waiting for the bot (sent {})…</div>"#,
            html_escape(submitted_at)
        ),
        TurnState::Failed { .. } => {
            r#"<div class="turn-status failed">The last message could not be delivered.</div>"#
                .to_string()
        }
        TurnState::Idle | TurnState::Resolved => String::new(),
    }
}

fn pretty_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0 24px; background: #fafafa; color: #222; }
.header-container { padding: 10px; background: white; border-bottom: 1px solid #ddd; display: flex; gap: 12px; align-items: end; }
.header-container input { display: block; padding: 6px; min-width: 16em; }
.header-container .meta { color: #777; font-size: 0.85em; }
.flash { margin: 8px 0; padding: 8px 12px; background: #e6f4ea; border: 1px solid #9bd3ae; border-radius: 5px; }
.columns { display: grid; grid-template-columns: 1fr 1fr; gap: 16px; margin-top: 12px; }
.panel .scroll { height: calc(100vh - 300px); overflow-y: auto; border: 1px solid #ddd; border-radius: 5px; padding: 10px; background: white; }
pre { background: #f4f4f4; padding: 8px; overflow-x: auto; }
.badge.error { background: #fde2e1; color: #a4262c; padding: 1px 6px; border-radius: 8px; font-size: 0.8em; }
.msg { margin: 8px 0; padding: 8px 12px; border-radius: 8px; overflow-wrap: break-word; }
.msg.user { background: #eef3ff; }
.msg.assistant { background: #f3f3f3; }
.msg.failed { border-left: 3px solid #a4262c; }
.msg-error { color: #a4262c; font-size: 0.85em; margin-top: 4px; }
.turn-status { margin: 6px 0; color: #555; font-style: italic; }
.turn-status.failed { color: #a4262c; }
.chat-input { position: sticky; bottom: 0; background: white; padding: 10px 0; display: flex; gap: 8px; }
.chat-input input { flex: 1; padding: 8px; }
"#;
