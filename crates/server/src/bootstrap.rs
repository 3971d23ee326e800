use std::sync::Arc;

use aisdr_agent::{OpenAiClient, PromptError, PromptRenderer};
use aisdr_core::config::{AppConfig, ConfigError, LoadOptions};
use aisdr_core::dedup::BoundedEventRegistry;
use aisdr_slack::SlackNotifier;
use aisdr_telemetry::{TelemetryContext, TelemetryError};
use thiserror::Error;
use tracing::{info, warn};

use crate::dispatch::BackgroundDispatcher;
use crate::health::HealthState;
use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub telemetry: Arc<TelemetryContext>,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("prompt templates could not be loaded: {0}")]
    Prompt(#[from] PromptError),
    #[error("http client could not be built: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Loads configuration, installs telemetry and wires the request-path collaborators.
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let mut config = AppConfig::load(options)?;
    let telemetry = aisdr_telemetry::init(&mut config.telemetry, &config.logging)?;

    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        service = %config.telemetry.service_name,
        "starting application bootstrap"
    );
    if config.slack.has_placeholder_token() {
        warn!(
            event_name = "system.bootstrap.placeholder_secret",
            secret = "slack.bot_token",
            "slack bot token is a placeholder; replies will be rejected"
        );
    }
    if config.llm.has_placeholder_key() {
        warn!(
            event_name = "system.bootstrap.placeholder_secret",
            secret = "llm.api_key",
            "completion api key is a placeholder; every request will fail"
        );
    }

    bootstrap_with_config(config, telemetry).await
}

pub async fn bootstrap_with_config(
    config: AppConfig,
    telemetry: Arc<TelemetryContext>,
) -> Result<Application, BootstrapError> {
    let http = reqwest::Client::builder().build().map_err(BootstrapError::HttpClient)?;
    let prompts = PromptRenderer::new(config.llm.system_prompt_path.as_deref())?;

    let dispatcher = BackgroundDispatcher::new(
        Arc::new(OpenAiClient::new(http.clone(), &config.llm)),
        Arc::new(SlackNotifier::new(
            http,
            config.slack.api_base_url.clone(),
            config.slack.bot_token.clone(),
        )),
        Arc::new(prompts),
        Arc::clone(&telemetry),
        config.dispatch.max_concurrency,
    );

    let state = AppState {
        registry: Arc::new(BoundedEventRegistry::from_config(&config.dedup)),
        dispatcher,
        telemetry: Arc::clone(&telemetry),
        health: HealthState::from_config(&config),
    };

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        max_concurrency = config.dispatch.max_concurrency,
        dedup_capacity = config.dedup.capacity,
        "application wired"
    );

    Ok(Application { config, telemetry, state })
}
