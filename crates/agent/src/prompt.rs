use std::fs;
use std::path::{Path, PathBuf};

use aisdr_core::domain::prospect::ProspectFields;
use tera::{Context, Tera};
use thiserror::Error;

use crate::llm::CompletionRequest;

const SYSTEM_TEMPLATE: &str = "system.txt";
const USER_TEMPLATE: &str = "user.txt";

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an experienced sales development representative for an observability platform.
You write short, specific cold emails to technical leaders.

The prospect is {{ name }}, {{ position }}, whose team currently relies on {{ competitor_tool }}.
Be concrete about what changes for a {{ position }} after switching from {{ competitor_tool }}.
Keep the email under 180 words, use a plain subject line, and end with one clear call to action.
Never invent customer names, pricing or benchmark numbers.";

const USER_PROMPT: &str = "\
Name: {{ name }}
Position: {{ position }}
Competitor Tool: {{ competitor_tool }}

Please craft a compelling cold email introducing our tool and why {{ name }} should consider \
switching from {{ competitor_tool }}.";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("could not read system prompt template `{path}`: {source}")]
    ReadTemplate { path: PathBuf, source: std::io::Error },
    #[error("prompt template error: {0}")]
    Template(#[from] tera::Error),
}

/// Renders the system and user prompts for one prospect.
pub struct PromptRenderer {
    tera: Tera,
}

impl PromptRenderer {
    pub fn new(system_prompt_path: Option<&Path>) -> Result<Self, PromptError> {
        let system_template = match system_prompt_path {
            Some(path) => fs::read_to_string(path).map_err(|source| PromptError::ReadTemplate {
                path: path.to_path_buf(),
                source,
            })?,
            None => DEFAULT_SYSTEM_PROMPT.to_owned(),
        };

        let mut tera = Tera::default();
        tera.add_raw_template(SYSTEM_TEMPLATE, &system_template)?;
        tera.add_raw_template(USER_TEMPLATE, USER_PROMPT)?;
        Ok(Self { tera })
    }

    pub fn render(&self, fields: &ProspectFields) -> Result<CompletionRequest, PromptError> {
        let mut context = Context::new();
        context.insert("name", &fields.name);
        context.insert("position", &fields.position);
        context.insert("competitor_tool", &fields.competitor_tool);

        Ok(CompletionRequest {
            system: self.tera.render(SYSTEM_TEMPLATE, &context)?,
            user: self.tera.render(USER_TEMPLATE, &context)?,
        })
    }
}
