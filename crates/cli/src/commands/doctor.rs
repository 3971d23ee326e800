use aisdr_core::config::{AppConfig, LoadOptions};
use aisdr_telemetry::headers::{header_sources, resolve, DiagnosticLevel, TargetPackage};
use aisdr_telemetry::TelemetryContext;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Readiness checks. Warnings do not fail the run; any failed check exits with 1.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = u8::from(report.overall_status == CheckStatus::Fail);

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            serde_json::json!({
                "overall_status": "fail",
                "summary": "doctor serialization failed",
                "error": error.to_string(),
            })
            .to_string()
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => vec![
            DoctorCheck::new("config_validation", CheckStatus::Pass, "configuration loaded and validated"),
            check_secrets(&config),
            check_otlp_headers(&config),
            check_telemetry_pipeline(&config),
        ],
        Err(error) => {
            let mut checks =
                vec![DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string())];
            for name in ["secret_readiness", "otlp_headers", "telemetry_pipeline"] {
                checks.push(DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                ));
            }
            checks
        }
    };

    let overall_status = if checks.iter().any(|check| check.status == CheckStatus::Fail) {
        CheckStatus::Fail
    } else if checks.iter().any(|check| check.status == CheckStatus::Warn) {
        CheckStatus::Warn
    } else {
        CheckStatus::Pass
    };
    let summary = match overall_status {
        CheckStatus::Pass => "doctor: all readiness checks passed",
        CheckStatus::Warn => "doctor: ready with warnings",
        _ => "doctor: one or more readiness checks failed",
    }
    .to_string();

    DoctorReport { overall_status, summary, checks }
}

fn check_secrets(config: &AppConfig) -> DoctorCheck {
    let mut placeholders = Vec::new();
    if config.slack.has_placeholder_token() {
        placeholders.push("slack.bot_token");
    }
    if config.llm.has_placeholder_key() {
        placeholders.push("llm.api_key");
    }

    if placeholders.is_empty() {
        DoctorCheck::new("secret_readiness", CheckStatus::Pass, "slack token and llm key configured")
    } else {
        DoctorCheck::new(
            "secret_readiness",
            CheckStatus::Fail,
            format!("placeholder values for: {}", placeholders.join(", ")),
        )
    }
}

fn check_otlp_headers(config: &AppConfig) -> DoctorCheck {
    if !config.telemetry.export_enabled {
        return DoctorCheck::new("otlp_headers", CheckStatus::Skipped, "OTLP export disabled");
    }

    let headers = resolve(&header_sources(&config.telemetry));
    let warnings: Vec<&str> = headers
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.level == DiagnosticLevel::Warn)
        .map(|diagnostic| diagnostic.message.as_str())
        .collect();

    if headers.has_placeholder_authorization() || !warnings.is_empty() {
        let mut details = warnings.join("; ");
        if details.is_empty() {
            details = "Authorization is the placeholder value".to_string();
        }
        return DoctorCheck::new("otlp_headers", CheckStatus::Warn, details);
    }

    let masked = headers.for_package(TargetPackage::Metrics).masked();
    DoctorCheck::new(
        "otlp_headers",
        CheckStatus::Pass,
        format!("{} headers per exporter: {:?}", masked.len(), masked),
    )
}

fn check_telemetry_pipeline(config: &AppConfig) -> DoctorCheck {
    let result = TelemetryContext::local(&config.telemetry).and_then(|context| {
        context.business_metrics().record_event("handshake");
        let exposition = context.render_prometheus()?;
        context.shutdown()?;
        Ok(exposition)
    });

    match result {
        Ok(exposition) if exposition.contains("aisdr_slack_events_total") => DoctorCheck::new(
            "telemetry_pipeline",
            CheckStatus::Pass,
            "local trace and metric pipelines built; prometheus exposition rendered",
        ),
        Ok(_) => DoctorCheck::new(
            "telemetry_pipeline",
            CheckStatus::Fail,
            "prometheus exposition did not contain recorded metrics",
        ),
        Err(error) => DoctorCheck::new("telemetry_pipeline", CheckStatus::Fail, error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
