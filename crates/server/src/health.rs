use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;

use aisdr_core::config::AppConfig;

use crate::routes::AppState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthState {
    slack_token_configured: bool,
    llm_key_configured: bool,
    telemetry_exporting: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub slack: HealthCheck,
    pub llm: HealthCheck,
    pub telemetry: HealthCheck,
    pub checked_at: String,
}

impl HealthState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            slack_token_configured: !config.slack.has_placeholder_token(),
            llm_key_configured: !config.llm.has_placeholder_key(),
            telemetry_exporting: config.telemetry.export_enabled,
        }
    }
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    report(&state.health)
}

pub fn report(state: &HealthState) -> (StatusCode, Json<HealthResponse>) {
    let slack = secret_check(state.slack_token_configured, "slack bot token");
    let llm = secret_check(state.llm_key_configured, "completion api key");
    let ready = state.slack_token_configured && state.llm_key_configured;

    let telemetry = HealthCheck {
        status: "ready",
        detail: if state.telemetry_exporting {
            "exporting over OTLP/HTTP".to_string()
        } else {
            "local pipelines only".to_string()
        },
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck { status: "ready", detail: "aisdr-server accepting webhooks".to_string() },
        slack,
        llm,
        telemetry,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn secret_check(configured: bool, what: &str) -> HealthCheck {
    if configured {
        HealthCheck { status: "ready", detail: format!("{what} configured") }
    } else {
        HealthCheck { status: "degraded", detail: format!("{what} is a placeholder") }
    }
}
