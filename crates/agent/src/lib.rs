//! Prompt rendering and completion calls.
//!
//! The relay asks the model for exactly one thing: a cold email for the prospect
//! described in the request text. `prompt` turns `ProspectFields` into a system and
//! user message; `llm` sends them to an OpenAI-compatible endpoint and classifies
//! the failure shapes the provider can produce.

pub mod llm;
pub mod prompt;

pub use llm::{CompletionClient, CompletionFailure, CompletionRequest, OpenAiClient};
pub use prompt::{PromptError, PromptRenderer};
