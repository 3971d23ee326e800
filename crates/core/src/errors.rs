use std::fmt;

/// The only text a user ever sees when background processing fails.
pub const APOLOGY_TEXT: &str = "Sorry, I couldn't process your request at the moment.";

/// Where a processing error happened. The label is the `error_type` attribute on the
/// processing-errors counter and must stay stable across releases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorSite {
    CompletionProvider,
    CompletionEmptyResponse,
    CompletionTransport,
    PromptRender,
    SlackTransport,
    ResponseUrlTransport,
}

impl ErrorSite {
    pub const ALL: [Self; 6] = [
        Self::CompletionProvider,
        Self::CompletionEmptyResponse,
        Self::CompletionTransport,
        Self::PromptRender,
        Self::SlackTransport,
        Self::ResponseUrlTransport,
    ];

    pub fn as_label(self) -> &'static str {
        match self {
            Self::CompletionProvider => "openai_api_error",
            Self::CompletionEmptyResponse => "openai_empty_response",
            Self::CompletionTransport => "openai_transport_error",
            Self::PromptRender => "prompt_render_error",
            Self::SlackTransport => "slack_transport_error",
            Self::ResponseUrlTransport => "response_url_transport_error",
        }
    }

    /// Transport failures escape the work unit; the others are answered with an apology.
    pub fn is_transport(self) -> bool {
        matches!(
            self,
            Self::CompletionTransport | Self::SlackTransport | Self::ResponseUrlTransport
        )
    }

    pub fn user_message(self) -> &'static str {
        APOLOGY_TEXT
    }
}

impl fmt::Display for ErrorSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
