//! Lex V2 runtime over the AWS SDK.
//!
//! Credentials come from the SDK's default chain (env vars, shared profile, SSO, container or
//! instance role) and every call is SigV4-signed by the SDK. One attempt per turn as far as
//! lexchat is concerned; the SDK's own standard retry mode still applies underneath.

use crate::error::LexError;
use crate::lex_client::{ConversationClient, LexReply, RecognizeTextRequest, RecognizeTextResponse};
use async_trait::async_trait;
use aws_sdk_lexruntimev2::error::DisplayErrorContext;
use aws_sdk_lexruntimev2::operation::recognize_text::RecognizeTextOutput;
use serde_json::{json, Map, Value};

pub struct SdkLexClient {
    client: aws_sdk_lexruntimev2::Client,
}

impl SdkLexClient {
    /// Client for `region` with credentials resolved from the environment.
    pub async fn from_env(region: &str) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.trim().to_string()))
            .load()
            .await;
        Self {
            client: aws_sdk_lexruntimev2::Client::new(&shared),
        }
    }

    /// Client from an explicit service config (fixed credentials, custom endpoint).
    pub fn from_conf(conf: aws_sdk_lexruntimev2::Config) -> Self {
        Self {
            client: aws_sdk_lexruntimev2::Client::from_conf(conf),
        }
    }

    pub async fn recognize_text(
        &self,
        request: &RecognizeTextRequest,
    ) -> Result<RecognizeTextResponse, LexError> {
        tracing::debug!(bot_id = %request.bot_id, locale_id = %request.locale_id, "Lex RecognizeText (sdk)");
        let output = self
            .client
            .recognize_text()
            .bot_id(request.bot_id.as_str())
            .bot_alias_id(request.bot_alias_id.as_str())
            .locale_id(request.locale_id.as_str())
            .session_id(request.session_id.as_str())
            .text(request.text.as_str())
            .send()
            .await
            .map_err(|e| LexError::Sdk(DisplayErrorContext(&e).to_string()))?;
        RecognizeTextResponse::from_value(output_json(&output))
    }
}

/// The SDK output in the service's own JSON field names, for the audit log.
fn output_json(output: &RecognizeTextOutput) -> Value {
    let mut raw = Map::new();
    let messages: Vec<Value> = output
        .messages()
        .iter()
        .map(|m| json!({"content": m.content(), "contentType": m.content_type().as_str()}))
        .collect();
    raw.insert("messages".to_string(), Value::Array(messages));

    if let Some(intent) = output.session_state().and_then(|s| s.intent()) {
        raw.insert(
            "sessionState".to_string(),
            json!({"intent": {"name": intent.name(), "state": intent.state().map(|s| s.as_str())}}),
        );
    }
    let interpretations: Vec<Value> = output
        .interpretations()
        .iter()
        .filter_map(|i| i.intent())
        .map(|intent| json!({"intent": {"name": intent.name()}}))
        .collect();
    if !interpretations.is_empty() {
        raw.insert("interpretations".to_string(), Value::Array(interpretations));
    }
    if let Some(attrs) = output.request_attributes() {
        raw.insert("requestAttributes".to_string(), json!(attrs));
    }
    if let Some(id) = output.session_id() {
        raw.insert("sessionId".to_string(), Value::String(id.to_string()));
    }
    Value::Object(raw)
}

#[async_trait]
impl ConversationClient for SdkLexClient {
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
    use crate::lex_client::LEX_SESSION_ID;
    use aws_sdk_lexruntimev2::config::{BehaviorVersion, Credentials, Region};
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const TURN_PATH: &str =
        "/bots/BOT123/botAliases/TSTALIASID/botLocales/en_US/sessions/test-session/text";

    fn client_for(server: &MockServer) -> SdkLexClient {
        let conf = aws_sdk_lexruntimev2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new(
                "AKIDLEXCHATTEST",
                "lexchat-test-secret",
                None,
                None,
                "lexchat-test",
            ))
            .endpoint_url(server.uri())
            .build();
        SdkLexClient::from_conf(conf)
    }

    fn request(text: &str) -> RecognizeTextRequest {
        RecognizeTextRequest {
            bot_id: "BOT123".to_string(),
            bot_alias_id: "TSTALIASID".to_string(),
            locale_id: "en_US".to_string(),
            session_id: LEX_SESSION_ID.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn calls_are_signed_with_resolved_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TURN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"content": "Hi there", "contentType": "PlainText"}],
                "sessionId": "test-session"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server).send_message(&request("hello")).await;
        assert_eq!(reply.reply_text("No response"), "Hi there");

        let received = server.received_requests().await.unwrap();
        let auth = received[0]
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(auth.starts_with("AWS4-HMAC-SHA256"));
        assert!(auth.contains("Credential=AKIDLEXCHATTEST/"));
        assert!(auth.contains("/us-east-1/lex/aws4_request"));
        assert!(received[0].headers.get("x-amz-date").is_some());
    }

    #[tokio::test]
    async fn output_keeps_service_field_names() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TURN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"content": "Booked", "contentType": "PlainText"}],
                "sessionId": "test-session",
                "requestAttributes": {"channel": "web"}
            })))
            .mount(&server)
            .await;

        match client_for(&server).send_message(&request("book")).await {
            LexReply::Response(r) => {
                assert_eq!(r.first_content(), Some("Booked"));
                assert_eq!(r.session_id.as_deref(), Some("test-session"));
                assert_eq!(r.raw["messages"][0]["contentType"], "PlainText");
                assert_eq!(r.raw["requestAttributes"]["channel"], "web");
            }
            LexReply::Error { error } => panic!("unexpected error: {}", error),
        }
    }

    #[tokio::test]
    async fn access_denied_becomes_error_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-amzn-ErrorType", "AccessDeniedException")
                    .set_body_json(serde_json::json!({"message": "not authorized"})),
            )
            .mount(&server)
            .await;

        let reply = client_for(&server).send_message(&request("hello")).await;
        assert!(reply.is_error());
        assert_eq!(reply.reply_text("No response"), "No response");
    }
}
