//! `aisdr config`: effective configuration with source attribution.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use aisdr_core::config::{AppConfig, LoadOptions};
use aisdr_telemetry::headers::{
    header_sources, resolve, ResolvedHeaders, AUTHORIZATION, MASKED_VALUE,
};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

/// One rendered setting: dotted key, display value, env vars checked highest first.
struct Setting {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Setting {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), 2)
        }
    };

    let file_path = detect_config_path();
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for setting in settings(&config) {
        let source = field_source(&setting, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", setting.key, setting.value));
    }

    CommandResult::text(lines.join("\n"))
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    let headers = resolve(&header_sources(&config.telemetry));

    vec![
        Setting::new(
            "slack.bot_token",
            redact_token(config.slack.bot_token.expose_secret()),
            &["AISDR_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN"],
        ),
        Setting::new(
            "slack.api_base_url",
            config.slack.api_base_url.as_str(),
            &["AISDR_SLACK_API_BASE_URL"],
        ),
        Setting::new(
            "llm.api_key",
            redact_token(config.llm.api_key.expose_secret()),
            &["AISDR_LLM_API_KEY", "OPENAI_API_KEY"],
        ),
        Setting::new("llm.base_url", config.llm.base_url.as_str(), &["AISDR_LLM_BASE_URL"]),
        Setting::new("llm.model", config.llm.model.as_str(), &["AISDR_LLM_MODEL"]),
        Setting::new(
            "llm.timeout_secs",
            config.llm.timeout_secs.map_or("<unset>".to_string(), |secs| secs.to_string()),
            &["AISDR_LLM_TIMEOUT_SECS"],
        ),
        Setting::new(
            "llm.system_prompt_path",
            config
                .llm
                .system_prompt_path
                .as_deref()
                .map_or("<built-in>".to_string(), |path| path.display().to_string()),
            &["AISDR_LLM_SYSTEM_PROMPT_PATH"],
        ),
        Setting::new(
            "server.bind_address",
            config.server.bind_address.as_str(),
            &["AISDR_SERVER_BIND_ADDRESS"],
        ),
        Setting::new(
            "server.port",
            config.server.port.to_string(),
            &["AISDR_SERVER_PORT", "PORT"],
        ),
        Setting::new(
            "dispatch.max_concurrency",
            match config.dispatch.max_concurrency {
                0 => "unbounded".to_string(),
                limit => limit.to_string(),
            },
            &["AISDR_DISPATCH_MAX_CONCURRENCY"],
        ),
        Setting::new("dedup.capacity", config.dedup.capacity.to_string(), &["AISDR_DEDUP_CAPACITY"]),
        Setting::new(
            "dedup.window_secs",
            config.dedup.window_secs.to_string(),
            &["AISDR_DEDUP_WINDOW_SECS"],
        ),
        Setting::new(
            "telemetry.export_enabled",
            config.telemetry.export_enabled.to_string(),
            &["AISDR_TELEMETRY_EXPORT_ENABLED"],
        ),
        Setting::new(
            "telemetry.endpoint",
            config.telemetry.endpoint.as_str(),
            &["OTEL_EXPORTER_OTLP_ENDPOINT"],
        ),
        Setting::new(
            "telemetry.exported_headers_json",
            masked_exported_json(&headers),
            &[
                "OBSERVE_INGEST_TOKEN",
                "OTEL_EXPORTER_OTLP_AUTH_HEADER",
                "OTEL_EXPORTER_OTLP_HEADERS",
            ],
        ),
        Setting::new(
            "telemetry.service_name",
            config.telemetry.service_name.as_str(),
            &["OTEL_SERVICE_NAME"],
        ),
        Setting::new(
            "telemetry.environment",
            config.telemetry.environment.as_str(),
            &["OTEL_ENVIRONMENT"],
        ),
        Setting::new("logging.level", config.logging.level.as_str(), &["AISDR_LOG_LEVEL", "LOG_LEVEL"]),
        Setting::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["AISDR_LOG_FORMAT"],
        ),
    ]
}

/// The encoded header JSON the telemetry bootstrap publishes, with Authorization masked.
fn masked_exported_json(headers: &ResolvedHeaders) -> String {
    let exported = headers.exported_json();
    let Ok(serde_json::Value::Object(mut map)) = serde_json::from_str(&exported) else {
        return exported;
    };
    for (key, value) in map.iter_mut() {
        if key.eq_ignore_ascii_case(AUTHORIZATION) {
            *value = serde_json::Value::String(MASKED_VALUE.to_string());
        }
    }
    serde_json::Value::Object(map).to_string()
}

fn detect_config_path() -> Option<PathBuf> {
    ["aisdr.toml", "config/aisdr.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    fs::read_to_string(path).ok()?.parse::<Value>().ok()
}

fn field_source(setting: &Setting, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if let Some(env_key) = setting.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let (Some(doc), Some(path)) = (file_doc, file_path) {
        if contains_path(doc, setting.key) {
            return format!("file ({})", path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.starts_with("YOUR_") {
        return format!("{trimmed} (placeholder)");
    }
    match trimmed.split_once('-') {
        Some((prefix, _)) => format!("{prefix}-***"),
        None => "<redacted>".to_string(),
    }
}
