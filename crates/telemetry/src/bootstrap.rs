use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use aisdr_core::config::{LogFormat, LoggingConfig, TelemetryConfig};
use opentelemetry::global;
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, MetricExporter, SpanExporter, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use prometheus::{Registry, TextEncoder};
use tracing::{info, warn};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry as SubscriberRegistry};

use crate::error::TelemetryError;
use crate::headers::{self, DiagnosticLevel, ResolvedHeaders, TargetPackage};
use crate::metrics::BusinessMetrics;
use crate::resource::build_resource;

pub const INSTRUMENTATION_NAME: &str = "aisdr";

/// Targets never forwarded to the OTLP log pipeline; their records are produced while
/// exporting and would feed back into it.
const LOG_BRIDGE_EXCLUDED_TARGETS: [&str; 6] =
    ["hyper", "h2", "reqwest", "tower", "opentelemetry", "tonic"];

static CONTEXT: OnceLock<Arc<TelemetryContext>> = OnceLock::new();
static NOOP_CONTEXT: OnceLock<Arc<TelemetryContext>> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Built but not yet installed providers. Construction is side-effect free, so it can
/// be exercised without touching process-global state.
pub struct TelemetryPipelines {
    resource: Resource,
    headers: ResolvedHeaders,
    export_enabled: bool,
    endpoint: String,
    registry: Registry,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    logger_provider: Option<SdkLoggerProvider>,
}

pub struct TelemetryContext {
    tracer: SdkTracer,
    meter: Meter,
    metrics: BusinessMetrics,
    registry: Option<Registry>,
    exported_headers_json: Option<String>,
    providers: Option<Providers>,
}

struct Providers {
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
    logger: Option<SdkLoggerProvider>,
}

impl TelemetryPipelines {
    pub fn build(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let resource = build_resource(config);
        let headers = headers::resolve(&headers::header_sources(config));
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let registry = Registry::new();

        let prometheus_reader = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .without_units()
            .without_counter_suffixes()
            .without_scope_info()
            .without_target_info()
            .build()
            .map_err(|error| TelemetryError::Prometheus(error.to_string()))?;

        if !config.export_enabled {
            let tracer_provider = SdkTracerProvider::builder().with_resource(resource.clone()).build();
            let meter_provider = SdkMeterProvider::builder()
                .with_resource(resource.clone())
                .with_reader(prometheus_reader)
                .build();

            return Ok(Self {
                resource,
                headers,
                export_enabled: false,
                endpoint,
                registry,
                tracer_provider,
                meter_provider,
                logger_provider: None,
            });
        }

        let timeout = Duration::from_secs(config.export_timeout_secs);
        let http_client = blocking_http_client(timeout)?;

        let span_exporter = SpanExporter::builder()
            .with_http()
            .with_http_client(http_client.clone())
            .with_endpoint(format!("{endpoint}/v1/traces"))
            .with_headers(headers.for_package(TargetPackage::Tracing).to_exporter_headers())
            .with_timeout(timeout)
            .build()?;
        let tracer_provider = SdkTracerProvider::builder()
            .with_batch_exporter(span_exporter)
            .with_resource(resource.clone())
            .build();

        let metric_exporter = MetricExporter::builder()
            .with_http()
            .with_http_client(http_client.clone())
            .with_endpoint(format!("{endpoint}/v1/metrics"))
            .with_headers(headers.for_package(TargetPackage::Metrics).to_exporter_headers())
            .with_timeout(timeout)
            .build()?;
        let periodic_reader = PeriodicReader::builder(metric_exporter)
            .with_interval(Duration::from_millis(config.metric_export_interval_ms))
            .build();
        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .with_reader(prometheus_reader)
            .with_reader(periodic_reader)
            .build();

        let log_exporter = LogExporter::builder()
            .with_http()
            .with_http_client(http_client)
            .with_endpoint(format!("{endpoint}/v1/logs"))
            .with_headers(headers.for_package(TargetPackage::HostExplorer).to_exporter_headers())
            .with_timeout(timeout)
            .build()?;
        let logger_provider = SdkLoggerProvider::builder()
            .with_resource(resource.clone())
            .with_batch_exporter(log_exporter)
            .build();

        Ok(Self {
            resource,
            headers,
            export_enabled: true,
            endpoint,
            registry,
            tracer_provider,
            meter_provider,
            logger_provider: Some(logger_provider),
        })
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn headers(&self) -> &ResolvedHeaders {
        &self.headers
    }

    pub fn export_enabled(&self) -> bool {
        self.export_enabled
    }

    pub fn into_context(self) -> TelemetryContext {
        let tracer = self.tracer_provider.tracer(INSTRUMENTATION_NAME);
        let meter = self.meter_provider.meter(INSTRUMENTATION_NAME);
        let metrics = BusinessMetrics::new(&meter);

        TelemetryContext {
            tracer,
            meter,
            metrics,
            registry: Some(self.registry),
            exported_headers_json: Some(self.headers.exported_json()),
            providers: Some(Providers {
                tracer: self.tracer_provider,
                meter: self.meter_provider,
                logger: self.logger_provider,
            }),
        }
    }

    fn log_resolution(&self) {
        for diagnostic in &self.headers.diagnostics {
            match diagnostic.level {
                DiagnosticLevel::Info => info!(
                    event_name = diagnostic.event_name,
                    correlation_id = "bootstrap",
                    "{}",
                    diagnostic.message
                ),
                DiagnosticLevel::Warn => warn!(
                    event_name = diagnostic.event_name,
                    correlation_id = "bootstrap",
                    "{}",
                    diagnostic.message
                ),
            }
        }

        if !self.export_enabled {
            info!(
                event_name = "telemetry.export.disabled",
                correlation_id = "bootstrap",
                "OTLP export disabled; telemetry stays local"
            );
            return;
        }

        for (package, path) in [
            (TargetPackage::Tracing, "/v1/traces"),
            (TargetPackage::Metrics, "/v1/metrics"),
            (TargetPackage::HostExplorer, "/v1/logs"),
        ] {
            let masked = self.headers.for_package(package).masked();
            info!(
                event_name = "telemetry.exporter.configured",
                correlation_id = "bootstrap",
                package = package.as_str(),
                url = %format!("{}{path}", self.endpoint),
                headers = ?masked,
                "OTLP exporter configured"
            );
        }
    }
}

impl TelemetryContext {
    /// A context whose instruments record into providers without readers or exporters.
    pub fn noop() -> Self {
        let tracer_provider = SdkTracerProvider::builder().build();
        let meter_provider = SdkMeterProvider::builder().build();
        let tracer = tracer_provider.tracer(INSTRUMENTATION_NAME);
        let meter = meter_provider.meter(INSTRUMENTATION_NAME);
        let metrics = BusinessMetrics::new(&meter);

        Self {
            tracer,
            meter,
            metrics,
            registry: None,
            exported_headers_json: None,
            providers: Some(Providers { tracer: tracer_provider, meter: meter_provider, logger: None }),
        }
    }

    /// Prometheus-only pipelines, never installed globally. Used for local development
    /// and by tests that assert on recorded metrics.
    pub fn local(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let mut local = config.clone();
        local.export_enabled = false;
        Ok(TelemetryPipelines::build(&local)?.into_context())
    }

    pub fn tracer(&self) -> &SdkTracer {
        &self.tracer
    }

    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    pub fn business_metrics(&self) -> &BusinessMetrics {
        &self.metrics
    }

    pub fn exported_headers_json(&self) -> Option<&str> {
        self.exported_headers_json.as_deref()
    }

    pub fn has_metrics_registry(&self) -> bool {
        self.registry.is_some()
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn render_prometheus(&self) -> Result<String, TelemetryError> {
        let Some(registry) = self.registry.as_ref() else {
            return Ok(String::new());
        };
        TextEncoder::new()
            .encode_to_string(&registry.gather())
            .map_err(|error| TelemetryError::Encode(error.to_string()))
    }

    /// Flushes and shuts down every provider. Blocks while exporters drain.
    pub fn shutdown(&self) -> Result<(), TelemetryError> {
        let Some(providers) = self.providers.as_ref() else {
            return Ok(());
        };

        let mut failures = Vec::new();
        if let Err(error) = providers.tracer.force_flush() {
            failures.push(format!("trace flush: {error:?}"));
        }
        if let Err(error) = providers.meter.force_flush() {
            failures.push(format!("metric flush: {error:?}"));
        }
        if let Some(logger) = providers.logger.as_ref() {
            if let Err(error) = logger.force_flush() {
                failures.push(format!("log flush: {error:?}"));
            }
            if let Err(error) = logger.shutdown() {
                failures.push(format!("log shutdown: {error:?}"));
            }
        }
        if let Err(error) = providers.meter.shutdown() {
            failures.push(format!("metric shutdown: {error:?}"));
        }
        if let Err(error) = providers.tracer.shutdown() {
            failures.push(format!("trace shutdown: {error:?}"));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TelemetryError::Shutdown(failures.join("; ")))
        }
    }
}

/// Builds the pipelines, installs the tracing subscriber and the global providers,
/// and caches the context. Later calls return the cached context.
pub fn init(
    config: &mut TelemetryConfig,
    logging: &LoggingConfig,
) -> Result<Arc<TelemetryContext>, TelemetryError> {
    if let Some(existing) = CONTEXT.get() {
        config.exported_headers_json = existing.exported_headers_json.clone();
        return Ok(Arc::clone(existing));
    }

    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(existing) = CONTEXT.get() {
        config.exported_headers_json = existing.exported_headers_json.clone();
        return Ok(Arc::clone(existing));
    }

    let pipelines = TelemetryPipelines::build(config)?;
    install_subscriber(logging, &pipelines)?;
    if let Some(rejected) = logging.rejected_level.as_deref() {
        warn!(
            event_name = "logging.level.unrecognized",
            correlation_id = "bootstrap",
            rejected,
            "unrecognized log level; using info"
        );
    }
    pipelines.log_resolution();

    global::set_text_map_propagator(TraceContextPropagator::new());
    global::set_tracer_provider(pipelines.tracer_provider.clone());
    global::set_meter_provider(pipelines.meter_provider.clone());

    let context = Arc::new(pipelines.into_context());
    config.exported_headers_json = context.exported_headers_json.clone();
    let _ = CONTEXT.set(Arc::clone(&context));

    info!(
        event_name = "telemetry.bootstrap.completed",
        correlation_id = "bootstrap",
        "telemetry initialized"
    );

    Ok(context)
}

/// The initialized context, or a shared no-op context if `init` never ran.
pub fn context() -> Arc<TelemetryContext> {
    if let Some(context) = CONTEXT.get() {
        return Arc::clone(context);
    }
    Arc::clone(NOOP_CONTEXT.get_or_init(|| Arc::new(TelemetryContext::noop())))
}

pub fn tracer() -> SdkTracer {
    context().tracer().clone()
}

pub fn meter() -> Meter {
    context().meter().clone()
}

pub fn business_metrics() -> BusinessMetrics {
    context().business_metrics().clone()
}

fn install_subscriber(
    logging: &LoggingConfig,
    pipelines: &TelemetryPipelines,
) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|error| TelemetryError::LogFilter {
            filter: logging.level.clone(),
            message: error.to_string(),
        })?;

    let mut layers: Vec<Box<dyn Layer<SubscriberRegistry> + Send + Sync>> = Vec::new();

    layers.push(match logging.format {
        LogFormat::Compact => tracing_subscriber::fmt::layer().with_target(false).compact().boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(false).pretty().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_target(false)
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    });

    layers.push(
        tracing_opentelemetry::layer()
            .with_tracer(pipelines.tracer_provider.tracer(INSTRUMENTATION_NAME))
            .boxed(),
    );

    if let Some(logger_provider) = pipelines.logger_provider.as_ref() {
        layers.push(
            OpenTelemetryTracingBridge::new(logger_provider)
                .with_filter(filter_fn(|metadata| {
                    !LOG_BRIDGE_EXCLUDED_TARGETS
                        .iter()
                        .any(|excluded| metadata.target().starts_with(excluded))
                }))
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).with(filter).try_init()?;
    Ok(())
}

/// The blocking client must be created off the async runtime; the batch processors
/// export from their own threads.
fn blocking_http_client(timeout: Duration) -> Result<reqwest::blocking::Client, TelemetryError> {
    std::thread::spawn(move || {
        reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| error.to_string())
    })
    .join()
    .map_err(|_| TelemetryError::ThreadSpawn)?
    .map_err(TelemetryError::HttpClient)
}
