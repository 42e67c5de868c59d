//! LLM server configuration (Ollama generate API)

use serde::{Deserialize, Serialize};

/// Configuration for the local LLM server
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct LlmConfig {
    /// Full URL of the generate endpoint
    pub url: String,

    /// Model name passed to the server
    pub model: String,

    /// Timeout in seconds for chat generation
    pub timeout: u64,

    /// Timeout in seconds for the triage classification call
    pub triage_timeout: u64,

    /// Sampling temperature for chat replies
    pub temperature: f32,

    /// Nucleus sampling for chat replies
    pub top_p: Option<f32>,

    /// Sampling temperature for triage classification
    pub triage_temperature: f32,

    /// Maximum retry attempts for transient failures
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    pub retry_delay_ms: u64,
}

pub(crate) const DEFAULT_URL: &str = "http://localhost:11434/api/generate";
pub(crate) const DEFAULT_MODEL: &str = "llama3:8b";

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.into(),
            model: DEFAULT_MODEL.into(),
            timeout: 60,
            triage_timeout: 10,
            temperature: 0.2,
            top_p: Some(0.9),
            triage_temperature: 0.1,
            max_retries: 0,
            retry_delay_ms: 500,
        }
    }
}
