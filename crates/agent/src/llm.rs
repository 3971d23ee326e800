use std::time::Duration;

use aisdr_core::config::LlmConfig;
use aisdr_core::errors::ErrorSite;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{field::Empty, info, info_span, warn, Instrument};

use aisdr_telemetry::propagation::inject_current_context;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CompletionFailure {
    #[error("completion provider returned an error: {0}")]
    Provider(String),
    #[error("completion provider returned no choices")]
    EmptyResponse,
    #[error("completion request failed: {0}")]
    Transport(String),
}

impl CompletionFailure {
    pub fn site(&self) -> ErrorSite {
        match self {
            Self::Provider(_) => ErrorSite::CompletionProvider,
            Self::EmptyResponse => ErrorSite::CompletionEmptyResponse,
            Self::Transport(_) => ErrorSite::CompletionTransport,
        }
    }
}

/// Turns a rendered prompt pair into generated text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionFailure>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `chat/completions` client.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    timeout: Option<Duration>,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, config: &LlmConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    fn interpret(response: ChatResponse) -> Result<String, CompletionFailure> {
        if let Some(error) = response.error {
            let message = error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| error.to_string());
            return Err(CompletionFailure::Provider(message));
        }

        let first = response.choices.unwrap_or_default().into_iter().next();
        let content = first.and_then(|choice| choice.message).and_then(|message| message.content);

        match content {
            Some(content) => Ok(content.trim().to_owned()),
            None => Err(CompletionFailure::EmptyResponse),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionFailure> {
        let url = format!("{}/chat/completions", self.base_url);
        let span = info_span!(
            "openai.chat.completions",
            otel.kind = "client",
            http.request.method = "POST",
            url.full = %url,
            gen_ai.request.model = %self.model,
            otel.status_code = Empty,
        );

        async {
            let body = ChatRequest {
                model: &self.model,
                messages: [
                    ChatMessage { role: "system", content: &request.system },
                    ChatMessage { role: "user", content: &request.user },
                ],
            };

            let mut headers = HeaderMap::new();
            inject_current_context(&mut headers);

            let mut builder = self
                .http
                .post(&url)
                .headers(headers)
                .bearer_auth(self.api_key.expose_secret())
                .json(&body);
            if let Some(timeout) = self.timeout {
                builder = builder.timeout(timeout);
            }

            let outcome = match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    match response.json::<ChatResponse>().await {
                        Ok(parsed) => {
                            info!(
                                event_name = "openai.response.received",
                                http_status = status.as_u16(),
                                "completion response received"
                            );
                            Self::interpret(parsed)
                        }
                        Err(error) => Err(CompletionFailure::Transport(format!(
                            "unreadable response ({status}): {error}"
                        ))),
                    }
                }
                Err(error) => Err(CompletionFailure::Transport(error.to_string())),
            };

            if let Err(failure) = &outcome {
                tracing::Span::current().record("otel.status_code", "ERROR");
                warn!(
                    event_name = "openai.request.failed",
                    error_type = failure.site().as_label(),
                    error = %failure,
                    "completion request failed"
                );
            }
            outcome
        }
        .instrument(span)
        .await
    }
}
