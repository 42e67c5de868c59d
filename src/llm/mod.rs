//! LLM server client
//!
//! Talks to a local Ollama server over its generate API, either collecting a
//! full answer (triage classification) or relaying tokens as they arrive
//! (chat replies).
//!
//! # Example
//!
//! ```ignore
//! use doctor_ai::llm::{create_client, GenerateRequest, LlmClient};
//!
//! let client = create_client(&config.llm)?;
//! let request = GenerateRequest::new("Is a resting pulse of 55 normal?", 0.2);
//! let mut stream = client.generate_stream(&request).await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?);
//! }
//! ```

mod ollama;
mod retry;
mod stream;
mod types;

pub use ollama::OllamaClient;
pub use retry::with_retry;
pub use types::{GenerateRequest, GenerateResponse, LlmClient, LlmError, RetryPolicy, TextStream};

use crate::config::LlmConfig;
use std::sync::Arc;

/// Create the client described by `config`, with retries when configured
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let client = OllamaClient::from_config(config)?;
    if config.max_retries == 0 {
        return Ok(Arc::new(client));
    }
    Ok(Arc::new(with_retry(client, RetryPolicy::from_config(config))))
}
