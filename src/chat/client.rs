//! Core `ChatBackend` trait and `OpenRouterClient` implementation.
//!
//! `OpenRouterClient` calls any OpenRouter/OpenAI-compatible
//! `/v1/chat/completions` endpoint.  All connection details come from
//! [`ChatConfig`]; nothing is hardcoded.
//!
//! Each request carries exactly two turns — the stored system prompt and the
//! user's text.  Prior assistant turns are never replayed; this widget keeps
//! no conversation memory beyond the fixed system prompt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ChatConfig;

/// Static identifying headers sent with every request (OpenRouter uses these
/// for request attribution).
const HTTP_REFERER: &str = "https://github.com/companion-chat/companion-chat";
const X_TITLE: &str = "Companion Chat";

// ---------------------------------------------------------------------------
// ChatError
// ---------------------------------------------------------------------------

/// Errors that can occur while fetching a reply.
///
/// Display strings are user-facing — the controller renders them directly
/// as an error turn in the transcript.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// No API key is configured.  Raised before any network activity.
    #[error("API Key not set. Please configure it in settings.")]
    MissingApiKey,

    /// HTTP transport or connection error.
    #[error("Error fetching AI response: {0}")]
    Request(String),

    /// The server returned a non-success status.  `message` is the
    /// server-provided `error.message` when present, otherwise a generic
    /// status-code message.
    #[error("Error fetching AI response: {message}")]
    Api { status: u16, message: String },

    /// A success status whose body is missing the expected reply field.
    #[error("Received an unexpected response from the AI.")]
    UnexpectedShape,
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        ChatError::Request(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One turn of the wire-format conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// `"system"`, `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

// Response parsing is deliberately lenient: every field is optional so a
// malformed body becomes `UnexpectedShape` instead of a deserialize error.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// ChatBackend trait
// ---------------------------------------------------------------------------

/// Async trait for chat-completion backends.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn ChatBackend>`).
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `user_text` and return the assistant's trimmed reply.
    async fn reply(&self, user_text: &str) -> Result<String, ChatError>;
}

// ---------------------------------------------------------------------------
// OpenRouterClient
// ---------------------------------------------------------------------------

/// Calls an OpenRouter/OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// # No hardcoded URLs
/// All connection details (`base_url`, `api_key`, `model`, system prompt)
/// come exclusively from the [`ChatConfig`] passed to
/// [`OpenRouterClient::from_config`].
///
/// No per-request timeout is configured: the only time-bounded wait in this
/// application is the TTS engine-availability poll.
pub struct OpenRouterClient {
    client: reqwest::Client,
    config: ChatConfig,
}

impl OpenRouterClient {
    /// Build a client from application config.
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl ChatBackend for OpenRouterClient {
    /// Send the stored system prompt plus `user_text` and return the reply.
    ///
    /// Fails fast with [`ChatError::MissingApiKey`] when no key is
    /// configured — the network is never touched without credentials.
    async fn reply(&self, user_text: &str) -> Result<String, ChatError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ChatError::MissingApiKey)?;

        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let messages = [
            ChatMessage::system(self.config.system_prompt.clone()),
            ChatMessage::user(user_text),
        ];
        let body = ChatRequest {
            model: &self.config.model,
            messages: &messages,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .header("HTTP-Referer", HTTP_REFERER)
            .header("X-Title", X_TITLE)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;

        if !status.is_success() {
            // Prefer the server's own error message when the body carries one.
            let message = serde_json::from_str::<ApiErrorBody>(&raw)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("Error: {}", status.as_u16()));
            log::warn!("chat API returned {status}: {message}");
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&raw).map_err(|_| ChatError::UnexpectedShape)?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or(ChatError::UnexpectedShape)?;

        Ok(content.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_config(base_url: &str, api_key: Option<&str>) -> ChatConfig {
        let mut config = ChatConfig::default();
        config.base_url = base_url.to_string();
        config.api_key = api_key.map(|s| s.to_string());
        config
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let server = MockServer::start().await;
        // Any request reaching the server would violate the credentials guard.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = OpenRouterClient::from_config(&make_config(&server.uri(), None));
        let err = client.reply("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::MissingApiKey));
        assert!(err.to_string().contains("API Key not set"));
    }

    #[tokio::test]
    async fn success_returns_trimmed_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-or-test"))
            .and(header_exists("HTTP-Referer"))
            .and(header("X-Title", "Companion Chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "  Hi there!  " } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            OpenRouterClient::from_config(&make_config(&server.uri(), Some("sk-or-test")));
        let reply = client.reply("hello").await.unwrap();
        assert_eq!(reply, "Hi there!");
    }

    #[tokio::test]
    async fn request_body_carries_system_and_user_turns() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "ok" } }]
            })))
            .mount(&server)
            .await;

        let mut config = make_config(&server.uri(), Some("sk-or-test"));
        config.system_prompt = "Be brief.".into();
        let client = OpenRouterClient::from_config(&config);
        client.reply("hello").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["model"], "deepseek/deepseek-chat-v3-0324:free");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Be brief.");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_success_uses_server_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Invalid key" }
            })))
            .mount(&server)
            .await;

        let client =
            OpenRouterClient::from_config(&make_config(&server.uri(), Some("sk-or-bad")));
        let err = client.reply("hello").await.unwrap_err();
        match err {
            ChatError::Api { status, ref message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid key");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert!(err.to_string().contains("Invalid key"));
    }

    #[tokio::test]
    async fn non_success_without_message_uses_status_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client =
            OpenRouterClient::from_config(&make_config(&server.uri(), Some("sk-or-test")));
        let err = client.reply("hello").await.unwrap_err();
        match err {
            ChatError::Api { status, ref message } => {
                assert_eq!(status, 503);
                assert!(message.contains("503"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_choices_is_unexpected_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "x" })))
            .mount(&server)
            .await;

        let client =
            OpenRouterClient::from_config(&make_config(&server.uri(), Some("sk-or-test")));
        let err = client.reply("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::UnexpectedShape));
    }

    #[tokio::test]
    async fn missing_content_is_unexpected_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": {} }]
            })))
            .mount(&server)
            .await;

        let client =
            OpenRouterClient::from_config(&make_config(&server.uri(), Some("sk-or-test")));
        let err = client.reply("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::UnexpectedShape));
    }

    #[tokio::test]
    async fn non_json_success_body_is_unexpected_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client =
            OpenRouterClient::from_config(&make_config(&server.uri(), Some("sk-or-test")));
        let err = client.reply("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::UnexpectedShape));
    }

    /// OpenRouterClient must be usable as `dyn ChatBackend`.
    #[test]
    fn client_is_object_safe() {
        let client: Box<dyn ChatBackend> =
            Box::new(OpenRouterClient::from_config(&ChatConfig::default()));
        drop(client);
    }
}
