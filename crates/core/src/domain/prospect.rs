use serde::{Deserialize, Serialize};

pub const DEFAULT_NAME: &str = "Jack";
pub const DEFAULT_POSITION: &str = "CTO";
pub const DEFAULT_COMPETITOR_TOOL: &str = "Datadog";

const NAME_LABEL: &str = "Name:";
const POSITION_LABEL: &str = "Position:";
const COMPETITOR_LABEL: &str = "Competitor:";

/// Prospect details pulled out of free-form request text such as
/// `Name: Ada, Position: Founder, Competitor: Rival`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProspectFields {
    pub name: String,
    pub position: String,
    pub competitor_tool: String,
}

impl Default for ProspectFields {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            position: DEFAULT_POSITION.to_string(),
            competitor_tool: DEFAULT_COMPETITOR_TOOL.to_string(),
        }
    }
}

impl ProspectFields {
    /// Scans comma-separated segments left to right. Each segment feeds at most one
    /// field (labels are tried in name, position, competitor order) and a repeated
    /// label overwrites the earlier value.
    pub fn extract(raw_text: &str) -> Self {
        let mut fields = Self::default();

        for segment in raw_text.split(',').map(str::trim) {
            if segment.contains(NAME_LABEL) {
                fields.name = labeled_value(segment, NAME_LABEL);
            } else if segment.contains(POSITION_LABEL) {
                fields.position = labeled_value(segment, POSITION_LABEL);
            } else if segment.contains(COMPETITOR_LABEL) {
                fields.competitor_tool = labeled_value(segment, COMPETITOR_LABEL);
            }
        }

        fields
    }
}

fn labeled_value(segment: &str, label: &str) -> String {
    segment.split(label).nth(1).unwrap_or_default().trim().to_string()
}
