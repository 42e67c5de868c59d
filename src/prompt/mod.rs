//! Prompt rendering
//!
//! Prompts are minijinja templates rendered with strict undefined handling,
//! so a missing variable is an error rather than an empty string.

mod templates;

pub use templates::DISCLAIMER;

use minijinja::{Environment, context};
use thiserror::Error;

const CHAT: &str = "chat.txt";
const TRIAGE: &str = "triage.txt";

/// Template rendering errors
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template '{name}' failed: {source}")]
    Render {
        name: &'static str,
        #[source]
        source: minijinja::Error,
    },
}

/// Inputs for the chat prompt
#[derive(Debug, Clone, Default)]
pub struct ChatPromptInput<'a> {
    pub message: &'a str,
    /// Recalled session context, possibly empty
    pub context: &'a str,
    /// Urgency alert for levels 1 and 2
    pub urgency: Option<&'a str>,
    /// Enrichment lines from the lookup tables
    pub info: &'a [String],
}

/// Renders chat and triage prompts
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        // The templates are compile-time constants
        env.add_template(CHAT, templates::CHAT_TEMPLATE).unwrap();
        env.add_template(TRIAGE, templates::TRIAGE_TEMPLATE).unwrap();
        Self { env }
    }

    fn render(&self, name: &'static str, ctx: minijinja::Value) -> Result<String, PromptError> {
        self.env
            .get_template(name)
            .and_then(|tmpl| tmpl.render(ctx))
            .map_err(|source| PromptError::Render { name, source })
    }

    /// Full prompt for a chat reply
    pub fn chat(&self, input: &ChatPromptInput<'_>) -> Result<String, PromptError> {
        self.render(
            CHAT,
            context! {
                disclaimer => DISCLAIMER,
                context => input.context,
                message => input.message,
                urgency => input.urgency,
                info => input.info,
            },
        )
    }

    /// Prompt asking for a LEVEL 1/2/3 classification
    pub fn triage(&self, message: &str) -> Result<String, PromptError> {
        self.render(TRIAGE, context! { message => message })
    }
}
