use async_trait::async_trait;
use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{field::Empty, info, info_span, warn, Instrument};

use aisdr_telemetry::propagation::inject_current_context;

use crate::commands::InChannelMessage;

/// How Slack answered a delivery that made it over the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Accepted,
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("slack api request failed: {0}")]
    SlackTransport(#[source] reqwest::Error),
    #[error("response url request failed: {0}")]
    ResponseUrlTransport(#[source] reqwest::Error),
}

/// Delivers generated text back to Slack.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> Result<Delivery, NotifyError>;

    async fn post_response(
        &self,
        response_url: &str,
        message: &InChannelMessage,
    ) -> Result<Delivery, NotifyError>;
}

#[derive(Debug, Deserialize)]
struct SlackApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct SlackNotifier {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: SecretString,
}

impl SlackNotifier {
    pub fn new(
        http: reqwest::Client,
        api_base_url: impl Into<String>,
        bot_token: SecretString,
    ) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_owned();
        Self { http, api_base_url, bot_token }
    }

    fn traced_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        inject_current_context(&mut headers);
        headers
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn post_message(&self, channel: &str, text: &str) -> Result<Delivery, NotifyError> {
        let url = format!("{}/chat.postMessage", self.api_base_url);
        let span = info_span!(
            "slack.chat.postMessage",
            otel.kind = "client",
            http.request.method = "POST",
            url.full = %url,
            channel = channel,
            otel.status_code = Empty,
        );

        async {
            let response = self
                .http
                .post(&url)
                .headers(Self::traced_headers())
                .bearer_auth(self.bot_token.expose_secret())
                .json(&json!({ "channel": channel, "text": text }))
                .send()
                .await
                .map_err(|error| {
                    tracing::Span::current().record("otel.status_code", "ERROR");
                    NotifyError::SlackTransport(error)
                })?;

            let status = response.status();
            let envelope = match response.json::<SlackApiEnvelope>().await {
                Ok(envelope) => envelope,
                Err(error) => {
                    warn!(
                        event_name = "slack.post_message.unreadable_response",
                        http_status = status.as_u16(),
                        error = %error,
                        "slack returned an unreadable response"
                    );
                    return Ok(Delivery::Rejected(format!("unreadable response ({status})")));
                }
            };

            if envelope.ok {
                info!(event_name = "slack.post_message.accepted", channel, "slack accepted message");
                Ok(Delivery::Accepted)
            } else {
                let reason = envelope.error.unwrap_or_else(|| "unknown_error".to_owned());
                warn!(
                    event_name = "slack.post_message.rejected",
                    channel,
                    slack_error = %reason,
                    "slack rejected message"
                );
                Ok(Delivery::Rejected(reason))
            }
        }
        .instrument(span)
        .await
    }

    async fn post_response(
        &self,
        response_url: &str,
        message: &InChannelMessage,
    ) -> Result<Delivery, NotifyError> {
        let span = info_span!(
            "slack.response_url",
            otel.kind = "client",
            http.request.method = "POST",
            otel.status_code = Empty,
        );

        async {
            let response = self
                .http
                .post(response_url)
                .headers(Self::traced_headers())
                .json(message)
                .send()
                .await
                .map_err(|error| {
                    tracing::Span::current().record("otel.status_code", "ERROR");
                    NotifyError::ResponseUrlTransport(error)
                })?;

            let status = response.status();
            if status.is_success() {
                info!(
                    event_name = "slack.response_url.accepted",
                    http_status = status.as_u16(),
                    "deferred reply delivered"
                );
                Ok(Delivery::Accepted)
            } else {
                warn!(
                    event_name = "slack.response_url.rejected",
                    http_status = status.as_u16(),
                    "response url rejected deferred reply"
                );
                Ok(Delivery::Rejected(format!("http status {status}")))
            }
        }
        .instrument(span)
        .await
    }
}
