use serde::{Deserialize, Serialize};

pub const DEFAULT_COMMAND: &str = "/aisdr";

/// Form body Slack posts for a slash command. Only the fields the relay uses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Body of both the immediate acknowledgement and the deferred reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InChannelMessage {
    pub response_type: String,
    pub text: String,
}

impl InChannelMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { response_type: "in_channel".to_owned(), text: text.into() }
    }
}

impl SlashCommandPayload {
    pub fn command_name(&self) -> &str {
        self.command
            .as_deref()
            .map(str::trim)
            .filter(|command| !command.is_empty())
            .unwrap_or(DEFAULT_COMMAND)
    }

    pub fn response_url(&self) -> Option<&str> {
        self.response_url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }

    pub fn acknowledgement(&self) -> InChannelMessage {
        InChannelMessage::new(format!(
            "Received: `{} {}`\n\nProcessing your request, please wait...",
            self.command_name(),
            self.text
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{InChannelMessage, SlashCommandPayload};

    #[test]
    fn acknowledgement_echoes_command_and_text() {
        let payload = SlashCommandPayload {
            command: Some("/aisdr".to_string()),
            text: "Name: Ada, Competitor: Rival".to_string(),
            response_url: Some("https://hooks.slack.test/r/1".to_string()),
            ..SlashCommandPayload::default()
        };

        assert_eq!(
            payload.acknowledgement(),
            InChannelMessage {
                response_type: "in_channel".to_string(),
                text: "Received: `/aisdr Name: Ada, Competitor: Rival`\n\nProcessing your request, please wait..."
                    .to_string(),
            }
        );
    }

    #[test]
    fn missing_command_defaults_to_aisdr() {
        let payload = SlashCommandPayload { text: "hi".to_string(), ..SlashCommandPayload::default() };

        assert_eq!(payload.command_name(), "/aisdr");
        assert!(payload.acknowledgement().text.starts_with("Received: `/aisdr hi`"));
    }

    #[test]
    fn blank_response_url_is_treated_as_missing() {
        let payload = SlashCommandPayload {
            response_url: Some("  ".to_string()),
            ..SlashCommandPayload::default()
        };
        assert_eq!(payload.response_url(), None);
    }

    #[test]
    fn deserializes_from_json_shaped_form_fields() {
        let payload: SlashCommandPayload = serde_json::from_value(serde_json::json!({
            "command": "/sdr",
            "text": "Name: Bo",
            "response_url": "https://hooks.slack.test/r/2",
            "team_id": "T1"
        }))
        .expect("payload");

        assert_eq!(payload.command_name(), "/sdr");
        assert_eq!(payload.response_url(), Some("https://hooks.slack.test/r/2"));
    }
}
