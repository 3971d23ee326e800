pub mod bootstrap;
pub mod error;
pub mod headers;
pub mod metrics;
pub mod propagation;
pub mod resource;

pub use bootstrap::{
    business_metrics, context, init, meter, tracer, TelemetryContext, TelemetryPipelines,
    INSTRUMENTATION_NAME,
};
pub use error::TelemetryError;
pub use headers::{HeaderDiagnostic, HeaderSource, OtlpHeaderSet, ResolvedHeaders, TargetPackage};
pub use metrics::{BusinessMetrics, Destination, Trigger};
