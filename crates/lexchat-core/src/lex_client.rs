//! Lex V2 runtime types and the plain-HTTP client: one `RecognizeText` call per chat turn.
//!
//! The call is a single best-effort attempt. Any failure (transport, non-2xx, undecodable body)
//! is folded into [`LexReply::Error`] so the turn driver always gets something to record.
//! [`LexClient`] sends unsigned JSON and is only for `lex_endpoint` targets (a SigV4 proxy,
//! a local stub). Real AWS endpoints go through [`crate::sdk_client::SdkLexClient`].

use crate::error::LexError;
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Lex session id sent with every turn. Multi-turn context on the bot side keys off this.
pub const LEX_SESSION_ID: &str = "test-session";

/// Outbound RecognizeText payload, recorded verbatim in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeTextRequest {
    pub bot_id: String,
    pub bot_alias_id: String,
    pub locale_id: String,
    pub session_id: String,
    pub text: String,
}

/// Only `text` travels in the body; the ids are path segments.
#[derive(Serialize)]
struct RecognizeTextBody<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Typed view of a RecognizeText reply. `raw` keeps the body exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizeTextResponse {
    pub messages: Option<Vec<LexMessage>>,
    pub session_state: Option<serde_json::Value>,
    pub interpretations: Option<serde_json::Value>,
    pub request_attributes: Option<serde_json::Value>,
    pub session_id: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseFields {
    #[serde(default)]
    messages: Option<Vec<LexMessage>>,
    #[serde(default)]
    session_state: Option<serde_json::Value>,
    #[serde(default)]
    interpretations: Option<serde_json::Value>,
    #[serde(default)]
    request_attributes: Option<serde_json::Value>,
    #[serde(default)]
    session_id: Option<String>,
}

impl RecognizeTextResponse {
    pub fn from_value(raw: serde_json::Value) -> Result<Self, LexError> {
        let fields: ResponseFields = serde_json::from_value(raw.clone())
            .map_err(|e| LexError::Decode(e.to_string()))?;
        Ok(Self {
            messages: fields.messages,
            session_state: fields.session_state,
            interpretations: fields.interpretations,
            request_attributes: fields.request_attributes,
            session_id: fields.session_id,
            raw,
        })
    }

    /// Content of the first message, if the bot said anything.
    pub fn first_content(&self) -> Option<&str> {
        self.messages
            .as_ref()
            .and_then(|m| m.first())
            .and_then(|m| m.content.as_deref())
    }
}

impl Serialize for RecognizeTextResponse {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RecognizeTextResponse {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Self::from_value(raw).map_err(serde::de::Error::custom)
    }
}

/// Outcome of one call: the service reply, or the error that replaced it.
/// Serializes as the raw reply or as `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LexReply {
    Error { error: String },
    Response(RecognizeTextResponse),
}

impl LexReply {
    pub fn is_error(&self) -> bool {
        matches!(self, LexReply::Error { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LexReply::Error { error } => Some(error),
            LexReply::Response(_) => None,
        }
    }

    /// Text to show as the assistant's reply; `placeholder` when there is none.
    pub fn reply_text(&self, placeholder: &str) -> String {
        match self {
            LexReply::Response(r) => r.first_content().unwrap_or(placeholder).to_string(),
            LexReply::Error { .. } => placeholder.to_string(),
        }
    }
}

impl From<LexError> for LexReply {
    fn from(err: LexError) -> Self {
        LexReply::Error {
            error: err.to_string(),
        }
    }
}

/// Anything that can answer a chat turn. The gateway holds one behind `Arc<dyn _>`.
#[async_trait]
pub trait ConversationClient: Send + Sync {
    async fn send_message(&self, request: &RecognizeTextRequest) -> LexReply;
}

/// reqwest-backed Lex V2 runtime client for an explicit base URL. Requests are not signed.
pub struct LexClient {
    endpoint: String,
    client: reqwest::Client,
}

impl LexClient {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `{endpoint}/bots/{bot}/botAliases/{alias}/botLocales/{locale}/sessions/{session}/text`,
    /// segments percent-encoded.
    pub fn recognize_text_url(&self, request: &RecognizeTextRequest) -> Result<Url, LexError> {
        let mut url =
            Url::parse(&self.endpoint).map_err(|e| LexError::Endpoint(format!("{}: {}", self.endpoint, e)))?;
        url.path_segments_mut()
            .map_err(|_| LexError::Endpoint(self.endpoint.clone()))?
            .pop_if_empty()
            .extend([
                "bots",
                request.bot_id.as_str(),
                "botAliases",
                request.bot_alias_id.as_str(),
                "botLocales",
                request.locale_id.as_str(),
                "sessions",
                request.session_id.as_str(),
                "text",
            ]);
        Ok(url)
    }

    /// One RecognizeText round trip, errors surfaced.
    pub async fn recognize_text(
        &self,
        request: &RecognizeTextRequest,
    ) -> Result<RecognizeTextResponse, LexError> {
        let url = self.recognize_text_url(request)?;
        tracing::debug!(%url, bot_id = %request.bot_id, "Lex RecognizeText");

        let res = self
            .client
            .post(url)
            .json(&RecognizeTextBody {
                text: &request.text,
            })
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(LexError::Service {
                status: status.as_u16(),
                body: text,
            });
        }

        let raw: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| LexError::Decode(e.to_string()))?;
        RecognizeTextResponse::from_value(raw)
    }
}

#[async_trait]
impl ConversationClient for LexClient {
    async fn send_message(&self, request: &RecognizeTextRequest) -> LexReply {
        match self.recognize_text(request).await {
            Ok(response) => LexReply::Response(response),
            Err(e) => {
                tracing::warn!(bot_id = %request.bot_id, error = %e, "Lex call failed");
                e.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn request(text: &str) -> RecognizeTextRequest {
        RecognizeTextRequest {
            bot_id: "BOT123".to_string(),
            bot_alias_id: "TSTALIASID".to_string(),
            locale_id: "en_US".to_string(),
            session_id: LEX_SESSION_ID.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn url_encodes_segments() {
        let client = LexClient::with_endpoint("https://lex-proxy.internal:8443");
        let mut req = request("hi");
        req.bot_id = "a b/c".to_string();
        let url = client.recognize_text_url(&req).unwrap();
        assert_eq!(
            url.as_str(),
            "https://lex-proxy.internal:8443/bots/a%20b%2Fc/botAliases/TSTALIASID/botLocales/en_US/sessions/test-session/text"
        );
    }

    #[test]
    fn endpoint_is_trimmed() {
        assert_eq!(
            LexClient::with_endpoint(" http://localhost:9000/ ").endpoint(),
            "http://localhost:9000"
        );
    }

    #[test]
    fn request_serializes_camel_case() {
        let v = serde_json::to_value(request("hello")).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "botId": "BOT123",
                "botAliasId": "TSTALIASID",
                "localeId": "en_US",
                "sessionId": "test-session",
                "text": "hello"
            })
        );
    }

    #[test]
    fn reply_text_takes_first_message_or_placeholder() {
        let reply = LexReply::Response(
            RecognizeTextResponse::from_value(serde_json::json!({
                "messages": [{"content": "hello", "contentType": "PlainText"}, {"content": "second"}]
            }))
            .unwrap(),
        );
        assert_eq!(reply.reply_text("No response"), "hello");

        let silent = LexReply::Response(
            RecognizeTextResponse::from_value(serde_json::json!({"sessionId": "test-session"})).unwrap(),
        );
        assert_eq!(silent.reply_text("No response"), "No response");

        let failed = LexReply::Error {
            error: "boom".to_string(),
        };
        assert_eq!(failed.reply_text("No response"), "No response");
        assert_eq!(failed.error(), Some("boom"));
    }

    #[test]
    fn reply_serializes_raw_or_error_object() {
        let raw = serde_json::json!({"messages": [{"content": "hi"}], "sessionId": "test-session"});
        let reply = LexReply::Response(RecognizeTextResponse::from_value(raw.clone()).unwrap());
        assert_eq!(serde_json::to_value(&reply).unwrap(), raw);

        let err = LexReply::Error {
            error: "denied".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({"error": "denied"})
        );
    }

    #[tokio::test]
    async fn send_message_returns_service_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/bots/BOT123/botAliases/TSTALIASID/botLocales/en_US/sessions/test-session/text",
            ))
            .and(body_json(serde_json::json!({"text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"content": "Hi there", "contentType": "PlainText"}],
                "sessionId": "test-session",
                "interpretations": [{"intent": {"name": "Greeting"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LexClient::with_endpoint(server.uri());
        let reply = client.send_message(&request("hello")).await;
        assert!(!reply.is_error());
        assert_eq!(reply.reply_text("No response"), "Hi there");
        match reply {
            LexReply::Response(r) => assert_eq!(r.session_id.as_deref(), Some("test-session")),
            LexReply::Error { .. } => panic!("expected response"),
        }
    }

    #[tokio::test]
    async fn service_error_becomes_error_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403).set_body_string(r#"{"message":"not authorized"}"#),
            )
            .mount(&server)
            .await;

        let client = LexClient::with_endpoint(server.uri());
        let reply = client.send_message(&request("hello")).await;
        let err = reply.error().unwrap();
        assert!(err.contains("403"));
        assert!(err.contains("not authorized"));
    }

    #[tokio::test]
    async fn undecodable_body_becomes_error_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = LexClient::with_endpoint(server.uri());
        let reply = client.send_message(&request("hello")).await;
        assert!(reply.error().unwrap().contains("parse"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_becomes_error_reply() {
        let client = LexClient::with_endpoint("http://127.0.0.1:1");
        let reply = client.send_message(&request("hello")).await;
        assert!(reply.is_error());
    }
}
