//! HTTP surface of the relay.
//!
//! - `POST /events`  - Slack Events API callbacks
//! - `POST /command` - slash command form posts
//! - `GET  /health`  - secret readiness
//! - `GET  /metrics` - Prometheus text exposition of the business metrics
//!
//! Both webhook handlers answer before any completion work starts; the work itself
//! goes to the `BackgroundDispatcher`.

use std::sync::Arc;

use aisdr_core::dedup::EventRegistry;
use aisdr_slack::{classify, Classification, InChannelMessage, SlashCommandPayload};
use aisdr_telemetry::propagation::{extract_remote_context, record_trace_id};
use aisdr_telemetry::{TelemetryContext, Trigger};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, field::Empty, info, info_span, warn, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

use crate::dispatch::{BackgroundDispatcher, DispatchJob, ReplyTarget};
use crate::health::{health, HealthState};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn EventRegistry>,
    pub dispatcher: BackgroundDispatcher,
    pub telemetry: Arc<TelemetryContext>,
    pub health: HealthState,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", post(events))
        .route("/command", post(command))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Server span for one inbound request, parented on the caller's `traceparent`.
fn request_span(request: &Request<Body>) -> Span {
    let span = info_span!(
        "http.request",
        otel.kind = "server",
        http.request.method = %request.method(),
        url.path = %request.uri().path(),
        otel.status_code = Empty,
        trace_id = Empty,
    );
    span.set_parent(extract_remote_context(request.headers()));
    record_trace_id(&span);
    span
}

async fn events(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    let classification = classify(&body, state.registry.as_ref());
    state.telemetry.business_metrics().record_event(classification.outcome_label());

    match classification {
        Classification::HandshakeEcho(challenge) => {
            info!(event_name = "slack.events.handshake", "answering url verification");
            Json(json!({ "challenge": challenge }))
        }
        Classification::Duplicate => {
            debug!(event_name = "slack.events.duplicate", "dropping redelivered event");
            Json(json!({ "status": "ok" }))
        }
        Classification::Ignored(reason) => {
            debug!(event_name = "slack.events.ignored", reason = reason.as_str(), "event ignored");
            Json(json!({ "status": "ok" }))
        }
        Classification::Actionable(event) => {
            let correlation_id =
                event.event_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
            info!(
                event_name = "slack.events.accepted",
                correlation_id = %correlation_id,
                channel = %event.channel_id,
                "dispatching event"
            );
            state.dispatcher.dispatch(DispatchJob {
                trigger: Trigger::Event,
                raw_text: event.raw_text,
                target: ReplyTarget::Channel(event.channel_id),
                correlation_id,
            });
            Json(json!({ "status": "ok" }))
        }
    }
}

async fn command(
    State(state): State<AppState>,
    Form(payload): Form<SlashCommandPayload>,
) -> Json<InChannelMessage> {
    state.telemetry.business_metrics().record_slash_command();
    let acknowledgement = payload.acknowledgement();

    match payload.response_url() {
        Some(response_url) => {
            let correlation_id = Uuid::new_v4().to_string();
            info!(
                event_name = "slack.command.accepted",
                correlation_id = %correlation_id,
                command = payload.command_name(),
                "dispatching slash command"
            );
            state.dispatcher.dispatch(DispatchJob {
                trigger: Trigger::SlashCommand,
                raw_text: payload.text.clone(),
                target: ReplyTarget::ResponseUrl(response_url.to_owned()),
                correlation_id,
            });
        }
        None => warn!(
            event_name = "slack.command.missing_response_url",
            command = payload.command_name(),
            "slash command has no response_url; nothing will be generated"
        ),
    }

    Json(acknowledgement)
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.telemetry.render_prometheus() {
        Ok(body) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        Err(error) => {
            error!(event_name = "metrics.render.failed", error = %error, "could not render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use aisdr_agent::PromptRenderer;
    use aisdr_core::config::AppConfig;
    use aisdr_core::dedup::BoundedEventRegistry;
    use aisdr_telemetry::metrics::{
        sample_value, BACKGROUND_TASKS_TOTAL, OPENAI_REQUESTS_TOTAL, SLACK_EVENTS_TOTAL,
        SLASH_COMMANDS_TOTAL,
    };
    use aisdr_telemetry::TelemetryContext;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tokio::time::{sleep, timeout};
    use tower::ServiceExt;

    use super::{router, AppState};
    use crate::dispatch::BackgroundDispatcher;
    use crate::health::HealthState;
    use crate::test_support::{Notification, RecordingNotifier, ScriptedCompletion};

    struct TestApp {
        router: Router,
        telemetry: Arc<TelemetryContext>,
        completion: Arc<ScriptedCompletion>,
        notifier: Arc<RecordingNotifier>,
    }

    fn app(reply: &str) -> TestApp {
        let config = AppConfig::default();
        let telemetry = Arc::new(TelemetryContext::local(&config.telemetry).expect("telemetry"));
        let completion = Arc::new(ScriptedCompletion::replying(reply));
        let notifier = Arc::new(RecordingNotifier::accepting());
        let dispatcher = BackgroundDispatcher::new(
            completion.clone(),
            notifier.clone(),
            Arc::new(PromptRenderer::new(None).expect("prompts")),
            telemetry.clone(),
            0,
        );
        let state = AppState {
            registry: Arc::new(BoundedEventRegistry::from_config(&config.dedup)),
            dispatcher,
            telemetry: telemetry.clone(),
            health: HealthState::from_config(&config),
        };
        TestApp { router: router(state), telemetry, completion, notifier }
    }

    async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        send(router, request).await
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn mention(event_id: &str, text: &str) -> Value {
        json!({
            "type": "event_callback",
            "event_id": event_id,
            "event": {"type": "app_mention", "text": text, "channel": "C42", "user": "U1"}
        })
    }

    fn metric(telemetry: &TelemetryContext, name: &str, label: (&str, &str)) -> Option<f64> {
        sample_value(&telemetry.render_prometheus().expect("render"), name, Some(label))
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge() {
        let app = app("unused");

        let (status, body) = post_json(
            &app.router,
            "/events",
            json!({"type": "url_verification", "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P", "token": "t"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"})
        );
        assert_eq!(metric(&app.telemetry, SLACK_EVENTS_TOTAL, ("outcome", "handshake")), Some(1.0));
        assert_eq!(app.completion.calls(), 0);
    }

    #[tokio::test]
    async fn app_mention_is_acknowledged_then_answered_in_channel() {
        let app = app("Hi Bo, a quick note about Splunk...");

        let (status, body) =
            post_json(&app.router, "/events", mention("Ev1", "Name: Bo, Competitor: Splunk")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));

        let notifications =
            timeout(Duration::from_secs(5), app.notifier.wait_for(1)).await.expect("reply in time");
        assert_eq!(
            notifications,
            vec![Notification::Channel {
                channel: "C42".to_string(),
                text: "Hi Bo, a quick note about Splunk...".to_string()
            }]
        );
        assert_eq!(app.completion.calls(), 1);
        assert!(app.completion.requests()[0].user.starts_with("Name: Bo\nPosition: CTO"));
        assert_eq!(metric(&app.telemetry, BACKGROUND_TASKS_TOTAL, ("trigger", "event")), Some(1.0));
        assert_eq!(
            metric(&app.telemetry, OPENAI_REQUESTS_TOTAL, ("competitor", "Splunk")),
            Some(1.0)
        );
        assert_eq!(
            metric(&app.telemetry, SLACK_EVENTS_TOTAL, ("outcome", "actionable")),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn redelivered_event_is_processed_once() {
        let app = app("reply");

        post_json(&app.router, "/events", mention("EvDup", "Name: Ada")).await;
        timeout(Duration::from_secs(5), app.notifier.wait_for(1)).await.expect("reply in time");

        let (status, body) = post_json(&app.router, "/events", mention("EvDup", "Name: Ada")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));

        sleep(Duration::from_millis(50)).await;
        assert_eq!(app.completion.calls(), 1);
        assert_eq!(app.notifier.notifications().len(), 1);
        assert_eq!(metric(&app.telemetry, SLACK_EVENTS_TOTAL, ("outcome", "duplicate")), Some(1.0));
    }

    #[tokio::test]
    async fn bot_messages_and_malformed_bodies_are_acknowledged_and_ignored() {
        let app = app("reply");

        let (_, bot) = post_json(
            &app.router,
            "/events",
            json!({
                "event_id": "EvBot",
                "event": {"type": "message", "bot_id": "B1", "text": "Name: Bot", "channel": "C1"}
            }),
        )
        .await;
        let malformed = Request::post("/events")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let (status, garbage) = send(&app.router, malformed).await;

        assert_eq!(bot, json!({"status": "ok"}));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(garbage, json!({"status": "ok"}));

        sleep(Duration::from_millis(50)).await;
        assert_eq!(app.completion.calls(), 0);
        assert_eq!(metric(&app.telemetry, SLACK_EVENTS_TOTAL, ("outcome", "ignored")), Some(2.0));
    }

    #[tokio::test]
    async fn slash_command_acknowledges_and_replies_via_response_url() {
        let app = app("Draft for Ada");
        let request = Request::post("/command")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(
                "command=%2Faisdr&text=Name%3A+Ada%2C+Competitor%3A+Rival\
                 &response_url=https%3A%2F%2Fhooks.slack.test%2Fr%2F1&channel_id=C9",
            ))
            .expect("request");

        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "response_type": "in_channel",
                "text": "Received: `/aisdr Name: Ada, Competitor: Rival`\n\nProcessing your request, please wait..."
            })
        );

        let notifications =
            timeout(Duration::from_secs(5), app.notifier.wait_for(1)).await.expect("reply in time");
        assert_eq!(
            notifications,
            vec![Notification::ResponseUrl {
                url: "https://hooks.slack.test/r/1".to_string(),
                response_type: "in_channel".to_string(),
                text: "Draft for Ada".to_string(),
            }]
        );
        let exposition = app.telemetry.render_prometheus().expect("render");
        assert_eq!(sample_value(&exposition, SLASH_COMMANDS_TOTAL, None), Some(1.0));
    }

    #[tokio::test]
    async fn slash_command_without_response_url_is_acknowledged_only() {
        let app = app("unused");
        let request = Request::post("/command")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("text=Name%3A+Ada"))
            .expect("request");

        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response_type"], "in_channel");
        sleep(Duration::from_millis(50)).await;
        assert_eq!(app.completion.calls(), 0);
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_prometheus_text() {
        let app = app("unused");
        post_json(&app.router, "/events", json!({"challenge": "c"})).await;

        let response = app
            .router
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()),
            Some("text/plain; version=0.0.4")
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let text = String::from_utf8(bytes.to_vec()).expect("utf8");
        assert!(text.contains("aisdr_slack_events_total"));
    }

    #[tokio::test]
    async fn health_route_reports_placeholder_secrets() {
        let app = app("unused");

        let request = Request::get("/health").body(Body::empty()).expect("request");
        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
    }
}
