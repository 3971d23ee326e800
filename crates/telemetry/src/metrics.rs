use std::time::Duration;

use aisdr_core::errors::ErrorSite;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

pub const SLACK_EVENTS_TOTAL: &str = "aisdr_slack_events_total";
pub const SLASH_COMMANDS_TOTAL: &str = "aisdr_slash_commands_total";
pub const OPENAI_REQUESTS_TOTAL: &str = "aisdr_openai_requests_total";
pub const OPENAI_REQUEST_DURATION_SECONDS: &str = "aisdr_openai_request_duration_seconds";
pub const SLACK_MESSAGES_SENT_TOTAL: &str = "aisdr_slack_messages_sent_total";
pub const EMAILS_GENERATED_TOTAL: &str = "aisdr_emails_generated_total";
pub const PROCESSING_ERRORS_TOTAL: &str = "aisdr_processing_errors_total";
pub const BACKGROUND_TASKS_TOTAL: &str = "aisdr_background_tasks_total";
pub const BACKGROUND_TASK_DURATION_SECONDS: &str = "aisdr_background_task_duration_seconds";

pub const METRIC_NAMES: [&str; 9] = [
    SLACK_EVENTS_TOTAL,
    SLASH_COMMANDS_TOTAL,
    OPENAI_REQUESTS_TOTAL,
    OPENAI_REQUEST_DURATION_SECONDS,
    SLACK_MESSAGES_SENT_TOTAL,
    EMAILS_GENERATED_TOTAL,
    PROCESSING_ERRORS_TOTAL,
    BACKGROUND_TASKS_TOTAL,
    BACKGROUND_TASK_DURATION_SECONDS,
];

/// What started a background unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Event,
    SlashCommand,
}

impl Trigger {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::SlashCommand => "slash_command",
        }
    }
}

/// Where a generated reply was delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    Channel,
    ResponseUrl,
}

impl Destination {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::ResponseUrl => "response_url",
        }
    }
}

/// The fixed business metric set. Instruments are created once per meter and are
/// cheap to clone.
#[derive(Clone)]
pub struct BusinessMetrics {
    slack_events: Counter<u64>,
    slash_commands: Counter<u64>,
    openai_requests: Counter<u64>,
    openai_request_duration: Histogram<f64>,
    slack_messages_sent: Counter<u64>,
    emails_generated: Counter<u64>,
    processing_errors: Counter<u64>,
    background_tasks: Counter<u64>,
    background_task_duration: Histogram<f64>,
}

impl BusinessMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            slack_events: meter
                .u64_counter(SLACK_EVENTS_TOTAL)
                .with_description("Slack Events API deliveries received")
                .with_unit("1")
                .build(),
            slash_commands: meter
                .u64_counter(SLASH_COMMANDS_TOTAL)
                .with_description("Slash commands received")
                .with_unit("1")
                .build(),
            openai_requests: meter
                .u64_counter(OPENAI_REQUESTS_TOTAL)
                .with_description("Completion requests issued")
                .with_unit("1")
                .build(),
            openai_request_duration: meter
                .f64_histogram(OPENAI_REQUEST_DURATION_SECONDS)
                .with_description("Completion request latency")
                .with_unit("s")
                .build(),
            slack_messages_sent: meter
                .u64_counter(SLACK_MESSAGES_SENT_TOTAL)
                .with_description("Replies delivered to Slack")
                .with_unit("1")
                .build(),
            emails_generated: meter
                .u64_counter(EMAILS_GENERATED_TOTAL)
                .with_description("Cold emails generated successfully")
                .with_unit("1")
                .build(),
            processing_errors: meter
                .u64_counter(PROCESSING_ERRORS_TOTAL)
                .with_description("Background processing errors by site")
                .with_unit("1")
                .build(),
            background_tasks: meter
                .u64_counter(BACKGROUND_TASKS_TOTAL)
                .with_description("Background work units started")
                .with_unit("1")
                .build(),
            background_task_duration: meter
                .f64_histogram(BACKGROUND_TASK_DURATION_SECONDS)
                .with_description("Background work unit duration")
                .with_unit("s")
                .build(),
        }
    }

    pub fn record_event(&self, outcome: &'static str) {
        self.slack_events.add(1, &[KeyValue::new("outcome", outcome)]);
    }

    pub fn record_slash_command(&self) {
        self.slash_commands.add(1, &[]);
    }

    pub fn record_completion_request(&self, competitor: &str, elapsed: Duration) {
        let attributes = [KeyValue::new("competitor", competitor.to_string())];
        self.openai_requests.add(1, &attributes);
        self.openai_request_duration.record(elapsed.as_secs_f64(), &attributes);
    }

    pub fn record_email_generated(&self, competitor: &str) {
        self.emails_generated.add(1, &[KeyValue::new("competitor", competitor.to_string())]);
    }

    pub fn record_message_sent(&self, destination: Destination) {
        self.slack_messages_sent.add(1, &[KeyValue::new("destination", destination.as_label())]);
    }

    pub fn record_error(&self, site: ErrorSite) {
        self.processing_errors.add(1, &[KeyValue::new("error_type", site.as_label())]);
    }

    pub fn record_task_started(&self, trigger: Trigger) {
        self.background_tasks.add(1, &[KeyValue::new("trigger", trigger.as_label())]);
    }

    pub fn record_task_duration(&self, trigger: Trigger, elapsed: Duration) {
        self.background_task_duration
            .record(elapsed.as_secs_f64(), &[KeyValue::new("trigger", trigger.as_label())]);
    }
}

/// Sums the samples of `metric` in a Prometheus text exposition, optionally limited
/// to series carrying `label="value"`.
pub fn sample_value(exposition: &str, metric: &str, label: Option<(&str, &str)>) -> Option<f64> {
    let wanted_label = label.map(|(key, value)| format!("{key}=\"{value}\""));
    let mut total = None;

    for line in exposition.lines().filter(|line| !line.starts_with('#')) {
        let Some((series, value)) = line.rsplit_once(' ') else {
            continue;
        };
        let name = series.split('{').next().unwrap_or(series);
        if name != metric {
            continue;
        }
        if let Some(wanted) = wanted_label.as_deref() {
            if !series.contains(wanted) {
                continue;
            }
        }
        if let Ok(parsed) = value.trim().parse::<f64>() {
            total = Some(total.unwrap_or(0.0) + parsed);
        }
    }

    total
}
