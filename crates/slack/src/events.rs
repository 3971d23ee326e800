use aisdr_core::dedup::{EventRegistry, Registration};
use serde::Deserialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Message,
    AppMention,
    Other(String),
}

impl EventKind {
    fn from_type(event_type: Option<&str>) -> Self {
        match event_type {
            Some("message") => Self::Message,
            Some("app_mention") => Self::AppMention,
            other => Self::Other(other.unwrap_or_default().to_owned()),
        }
    }
}

/// One Events API delivery, reduced to what classification and dispatch need.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub event_id: Option<String>,
    pub kind: EventKind,
    pub originates_from_bot: bool,
    pub has_subtype: bool,
    pub channel_id: String,
    pub raw_text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    MalformedPayload,
    UnsupportedType(String),
    BotOriginated,
    HasSubtype,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedPayload => "malformed_payload",
            Self::UnsupportedType(_) => "unsupported_type",
            Self::BotOriginated => "bot_originated",
            Self::HasSubtype => "has_subtype",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Classification {
    HandshakeEcho(Value),
    Duplicate,
    Ignored(IgnoreReason),
    Actionable(InboundEvent),
}

impl Classification {
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::HandshakeEcho(_) => "handshake",
            Self::Duplicate => "duplicate",
            Self::Ignored(_) => "ignored",
            Self::Actionable(_) => "actionable",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawPayload {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    event: Option<RawEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEvent {
    #[serde(rename = "type", default)]
    event_type: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    channel: Option<String>,
}

impl InboundEvent {
    fn from_raw(payload: RawPayload) -> Self {
        let event = payload.event.unwrap_or_default();
        Self {
            event_id: payload.event_id.filter(|id| !id.is_empty()),
            kind: EventKind::from_type(event.event_type.as_deref()),
            originates_from_bot: event.bot_id.is_some_and(|id| !id.is_empty()),
            has_subtype: event.subtype.is_some_and(|subtype| !subtype.is_empty()),
            channel_id: event.channel.unwrap_or_default(),
            raw_text: event.text.unwrap_or_default(),
        }
    }
}

/// Decides what to do with a raw `/events` body.
///
/// The identifier is registered before the ignore checks, so a redelivery of an
/// ignored event is reported as `Duplicate`.
pub fn classify(body: &[u8], registry: &dyn EventRegistry) -> Classification {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return Classification::Ignored(IgnoreReason::MalformedPayload);
    };

    if let Some(challenge) = value.get("challenge") {
        return Classification::HandshakeEcho(challenge.clone());
    }

    let event_id = value.get("event_id").and_then(Value::as_str).filter(|id| !id.is_empty());
    if let Some(event_id) = event_id {
        if registry.register(event_id) == Registration::AlreadySeen {
            return Classification::Duplicate;
        }
    }

    let Ok(payload) = serde_json::from_value::<RawPayload>(value) else {
        return Classification::Ignored(IgnoreReason::MalformedPayload);
    };
    let event = InboundEvent::from_raw(payload);

    if let EventKind::Other(event_type) = &event.kind {
        return Classification::Ignored(IgnoreReason::UnsupportedType(event_type.clone()));
    }
    if event.originates_from_bot {
        return Classification::Ignored(IgnoreReason::BotOriginated);
    }
    if event.has_subtype {
        return Classification::Ignored(IgnoreReason::HasSubtype);
    }

    Classification::Actionable(event)
}
