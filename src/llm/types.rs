//! Core types and traits for talking to the LLM server

use crate::config::LlmConfig;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Error types that can occur while generating
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Request timed out
    #[error("timeout after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Rate limited by the server
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit { retry_after: Option<Duration> },

    /// Authentication failed
    #[error("HTTP {status}: authentication failed: {message}")]
    Auth { status: u16, message: String },

    /// Connection or transport failure
    #[error("network error: {message}")]
    Network { message: String },

    /// Server answered 5xx
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// Server rejected the request (4xx)
    #[error("HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Failed to parse response
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Invalid client configuration
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl LlmError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout { .. }
                | LlmError::RateLimit { .. }
                | LlmError::Network { .. }
                | LlmError::Server { .. }
        )
    }

    /// Get suggested retry delay for rate limit errors
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status returned by the server, if the failure carried one
    pub fn http_status(&self) -> Option<u16> {
        match self {
            LlmError::Auth { status, .. }
            | LlmError::Server { status, .. }
            | LlmError::Rejected { status, .. } => Some(*status),
            LlmError::RateLimit { .. } => Some(429),
            _ => None,
        }
    }

    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    pub fn rate_limit(retry_after: Option<Duration>) -> Self {
        Self::RateLimit { retry_after }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

/// Sampling options forwarded to the server
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// Request to generate text
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// The prompt to send
    pub prompt: String,

    /// Sampling options
    pub options: SamplingOptions,

    /// Override timeout for this request
    pub timeout: Option<Duration>,
}

impl GenerateRequest {
    /// Create a request with the given prompt and temperature
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            options: SamplingOptions {
                temperature,
                top_p: None,
            },
            timeout: None,
        }
    }

    pub fn with_top_p(mut self, top_p: Option<f32>) -> Self {
        self.options.top_p = top_p;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Complete (non-streamed) generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Generated text
    pub text: String,

    /// Model that answered (if reported)
    pub model: Option<String>,

    /// Time taken
    pub duration: Duration,
}

impl GenerateResponse {
    pub fn new(text: String, duration: Duration) -> Self {
        Self {
            text,
            model: None,
            duration,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Stream of text chunks as the server produces them
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Trait for LLM clients
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a complete answer
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError>;

    /// Open a streamed generation
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<TextStream, LlmError>;

    /// Model name this client talks to
    fn model(&self) -> &str;

    /// Check if the server is reachable
    async fn is_available(&self) -> bool {
        true
    }
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries
    pub max_retries: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy from LLM config
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.retry_delay_ms),
            ..Default::default()
        }
    }

    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter {
            // Add up to 25% jitter
            let jitter = rand::random::<f64>() * 0.25 * capped_delay;
            capped_delay + jitter
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }
}
