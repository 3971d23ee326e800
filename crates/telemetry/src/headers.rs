//! OTLP export header resolution.
//!
//! Headers come from an ordered list of [`HeaderSource`]s, lowest precedence first.
//! Each source contributes a partial map that is merged by key overwrite. The result
//! is percent-encoded per exporter family and tagged with the routing package.

use std::collections::{BTreeMap, HashMap};

use aisdr_core::config::TelemetryConfig;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use secrecy::{ExposeSecret, SecretString};

pub const AUTHORIZATION: &str = "Authorization";
pub const TARGET_PACKAGE_HEADER: &str = "x-observe-target-package";
pub const PLACEHOLDER_AUTHORIZATION: &str = "Bearer <YOUR_INGEST_TOKEN>";
pub const MASKED_VALUE: &str = "<masked>";

/// Unreserved characters per RFC 3986 stay as-is; everything else is escaped.
const HEADER_VALUE_ESCAPES: &AsciiSet =
    &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

#[derive(Clone, Debug)]
pub enum HeaderSource {
    /// JSON object of header name to value.
    BulkJson(String),
    /// A single `key=value` pair; the value may already be percent-encoded.
    SingleHeader(String),
    /// Forces `Authorization: Bearer <token>`.
    IngestToken(SecretString),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetPackage {
    Tracing,
    Metrics,
    HostExplorer,
}

impl TargetPackage {
    pub const ALL: [Self; 3] = [Self::Tracing, Self::Metrics, Self::HostExplorer];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tracing => "Tracing",
            Self::Metrics => "Metrics",
            Self::HostExplorer => "Host Explorer",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warn,
}

/// A note produced while resolving headers. Resolution runs before the subscriber is
/// installed, so these are buffered and logged afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderDiagnostic {
    pub level: DiagnosticLevel,
    pub event_name: &'static str,
    pub message: String,
}

impl HeaderDiagnostic {
    fn warn(event_name: &'static str, message: impl Into<String>) -> Self {
        Self { level: DiagnosticLevel::Warn, event_name, message: message.into() }
    }

    fn info(event_name: &'static str, message: impl Into<String>) -> Self {
        Self { level: DiagnosticLevel::Info, event_name, message: message.into() }
    }
}

/// Raw, merged header values shared by every exporter family.
#[derive(Clone, Debug, Default)]
pub struct ResolvedHeaders {
    raw: BTreeMap<String, String>,
    pub diagnostics: Vec<HeaderDiagnostic>,
}

/// Header set handed to one exporter. Values are already percent-encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtlpHeaderSet {
    package: TargetPackage,
    encoded: BTreeMap<String, String>,
}

/// Orders the configured sources from lowest to highest precedence.
pub fn header_sources(config: &TelemetryConfig) -> Vec<HeaderSource> {
    let mut sources = Vec::new();

    if let Some(json) = config.headers_json.as_ref().filter(|value| !value.trim().is_empty()) {
        sources.push(HeaderSource::BulkJson(json.clone()));
    }
    if let Some(pair) = config.auth_header.as_ref().filter(|value| !value.trim().is_empty()) {
        sources.push(HeaderSource::SingleHeader(pair.clone()));
    }
    if let Some(token) =
        config.ingest_token.as_ref().filter(|token| !token.expose_secret().trim().is_empty())
    {
        sources.push(HeaderSource::IngestToken(token.clone()));
    }

    sources
}

pub fn resolve(sources: &[HeaderSource]) -> ResolvedHeaders {
    let mut resolved = ResolvedHeaders::default();

    for source in sources {
        match source {
            HeaderSource::BulkJson(json) => resolved.merge_bulk_json(json),
            HeaderSource::SingleHeader(pair) => resolved.merge_single_header(pair),
            HeaderSource::IngestToken(token) => resolved.apply_ingest_token(token),
        }
    }

    if resolved.raw.is_empty() {
        resolved.raw.insert(AUTHORIZATION.to_string(), PLACEHOLDER_AUTHORIZATION.to_string());
        resolved.diagnostics.push(HeaderDiagnostic::warn(
            "telemetry.headers.placeholder",
            "no OTLP headers configured; exporting with placeholder Authorization",
        ));
    }

    resolved
}

impl ResolvedHeaders {
    fn merge_bulk_json(&mut self, json: &str) {
        match serde_json::from_str::<serde_json::Value>(json) {
            Ok(serde_json::Value::Object(map)) => {
                for (key, value) in map {
                    let value = match value {
                        serde_json::Value::String(text) => text,
                        other => other.to_string(),
                    };
                    self.insert_header(key, value);
                }
            }
            Ok(_) => self.diagnostics.push(HeaderDiagnostic::warn(
                "telemetry.headers.invalid_json",
                "OTEL_EXPORTER_OTLP_HEADERS must be a JSON object; ignoring it",
            )),
            Err(error) => self.diagnostics.push(HeaderDiagnostic::warn(
                "telemetry.headers.invalid_json",
                format!("invalid OTEL_EXPORTER_OTLP_HEADERS: {error}"),
            )),
        }
    }

    fn merge_single_header(&mut self, pair: &str) {
        let Some((key, value)) = pair.split_once('=') else {
            self.diagnostics.push(HeaderDiagnostic::warn(
                "telemetry.headers.invalid_auth_header",
                "invalid OTEL_EXPORTER_OTLP_AUTH_HEADER format, expected 'key=value'",
            ));
            return;
        };

        let key = title_case(key.trim());
        let value = value.trim();
        let value = if value.contains('%') { decode_value(value) } else { value.to_string() };
        self.insert_header(key, value);
    }

    fn apply_ingest_token(&mut self, token: &SecretString) {
        let forced = format!("Bearer {}", token.expose_secret());
        let replaced = self.insert_header(AUTHORIZATION.to_string(), forced.clone());

        if replaced.iter().any(|previous| *previous != forced) {
            self.diagnostics.push(HeaderDiagnostic::info(
                "telemetry.headers.ingest_token_override",
                "OBSERVE_INGEST_TOKEN overrides Authorization header defined by other variables",
            ));
        }
    }

    /// Header names are case-insensitive: any existing key equal to `key` ignoring
    /// ASCII case is dropped before inserting. Returns the dropped values.
    fn insert_header(&mut self, key: String, value: String) -> Vec<String> {
        let existing_keys: Vec<String> = self
            .raw
            .keys()
            .filter(|existing| existing.eq_ignore_ascii_case(&key))
            .cloned()
            .collect();
        let replaced =
            existing_keys.iter().filter_map(|existing| self.raw.remove(existing)).collect();
        self.raw.insert(key, value);
        replaced
    }

    pub fn raw_value(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }

    pub fn has_placeholder_authorization(&self) -> bool {
        self.raw.get(AUTHORIZATION).is_some_and(|value| value == PLACEHOLDER_AUTHORIZATION)
    }

    pub fn for_package(&self, package: TargetPackage) -> OtlpHeaderSet {
        let mut encoded: BTreeMap<String, String> =
            self.raw.iter().map(|(key, value)| (key.clone(), encode_value(value))).collect();
        encoded.insert(TARGET_PACKAGE_HEADER.to_string(), encode_value(package.as_str()));
        OtlpHeaderSet { package, encoded }
    }

    /// Family-independent encoded headers as a JSON object.
    pub fn exported_json(&self) -> String {
        let encoded: BTreeMap<&str, String> =
            self.raw.iter().map(|(key, value)| (key.as_str(), encode_value(value))).collect();
        serde_json::to_string(&encoded).unwrap_or_else(|_| "{}".to_string())
    }
}

impl OtlpHeaderSet {
    pub fn package(&self) -> TargetPackage {
        self.package
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.encoded.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    pub fn to_exporter_headers(&self) -> HashMap<String, String> {
        self.encoded.iter().map(|(key, value)| (key.clone(), value.clone())).collect()
    }

    /// Copy safe to log: Authorization, in any casing, is replaced with `<masked>`.
    pub fn masked(&self) -> BTreeMap<String, String> {
        self.encoded
            .iter()
            .map(|(key, value)| {
                let shown = if key.eq_ignore_ascii_case(AUTHORIZATION) {
                    MASKED_VALUE.to_string()
                } else {
                    value.clone()
                };
                (key.clone(), shown)
            })
            .collect()
    }
}

pub fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, HEADER_VALUE_ESCAPES).to_string()
}

pub fn decode_value(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Uppercases the first letter of every alphabetic run and lowercases the rest, so
/// `x-observe-KEY` becomes `X-Observe-Key`.
pub fn title_case(key: &str) -> String {
    let mut output = String::with_capacity(key.len());
    let mut previous_is_letter = false;

    for ch in key.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            output.push(ch);
            previous_is_letter = false;
        }
    }

    output
}
