use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build OTLP exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),
    #[error("failed to build prometheus exporter: {0}")]
    Prometheus(String),
    #[error("failed to build telemetry http client: {0}")]
    HttpClient(String),
    #[error("telemetry http client thread panicked")]
    ThreadSpawn,
    #[error("invalid log filter `{filter}`: {message}")]
    LogFilter { filter: String, message: String },
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
    #[error("failed to encode metrics: {0}")]
    Encode(String),
    #[error("telemetry shutdown incomplete: {0}")]
    Shutdown(String),
}
