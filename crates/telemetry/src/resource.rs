use aisdr_core::config::TelemetryConfig;
use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;

/// Identity attributes attached to every span, metric and log record.
pub fn resource_attributes(config: &TelemetryConfig) -> Vec<(&'static str, String)> {
    vec![
        ("service.name", config.service_name.clone()),
        ("service.version", config.service_version.clone()),
        ("deployment.environment", config.environment.clone()),
        ("service.instance.id", config.instance_id.clone()),
        ("service.team", config.team.clone()),
        ("service.component", config.component.clone()),
    ]
}

pub fn build_resource(config: &TelemetryConfig) -> Resource {
    let attributes = resource_attributes(config)
        .into_iter()
        .filter(|(key, _)| *key != "service.name")
        .map(|(key, value)| KeyValue::new(key, value));

    Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes(attributes)
        .build()
}
