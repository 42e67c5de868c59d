//! Ollama generate API client

use super::stream::decode_ndjson;
use super::types::{
    GenerateRequest, GenerateResponse, LlmClient, LlmError, SamplingOptions, TextStream,
};
use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Client for a local Ollama server's `/api/generate` endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    /// Full generate URL
    url: String,

    /// Model to request
    model: String,

    /// Default timeout
    timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a SamplingOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: String,
    model: Option<String>,
}

impl OllamaClient {
    /// Create a new client from config
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self::new(&config.url, &config.model)?.with_timeout(Duration::from_secs(config.timeout)))
    }

    /// Create a new client with explicit parameters
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Config {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            url: url.into(),
            model: model.into(),
            timeout: Duration::from_secs(60),
            client,
        })
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL used for the availability check
    fn tags_url(&self) -> String {
        let base = match self.url.find("/api/") {
            Some(idx) => &self.url[..idx],
            None => self.url.trim_end_matches('/'),
        };
        format!("{}/api/tags", base)
    }

    /// Map HTTP status to LlmError
    fn map_http_error(&self, status: reqwest::StatusCode, body: &str) -> LlmError {
        let code = status.as_u16();
        let message = ollama_error_message(body);
        match code {
            401 | 403 => LlmError::Auth {
                status: code,
                message,
            },
            429 => LlmError::rate_limit(None),
            // gateway timeouts stay retryable but keep their status for the user
            408 | 504 => LlmError::Server {
                status: code,
                message,
            },
            400..=499 => LlmError::Rejected {
                status: code,
                message,
            },
            _ => LlmError::Server {
                status: code,
                message,
            },
        }
    }

    async fn send(
        &self,
        request: &GenerateRequest,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let start = Instant::now();
        let timeout = request.timeout.unwrap_or(self.timeout);

        let body = GenerateBody {
            model: &self.model,
            prompt: &request.prompt,
            stream,
            options: &request.options,
        };

        let http_request = self.client.post(&self.url).json(&body);
        let result = tokio::time::timeout(timeout, http_request.send()).await;

        match result {
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() {
                    Ok(response)
                } else {
                    let body = response.text().await.unwrap_or_default();
                    Err(self.map_http_error(status, &body))
                }
            }
            Ok(Err(e)) => {
                if e.is_timeout() {
                    Err(LlmError::timeout(start.elapsed()))
                } else if e.is_connect() {
                    Err(LlmError::network(format!("connection failed: {}", e)))
                } else {
                    Err(LlmError::network(format!("request failed: {}", e)))
                }
            }
            Err(_) => Err(LlmError::timeout(start.elapsed())),
        }
    }
}

/// Ollama reports failures as `{"error": "..."}`
fn ollama_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let start = Instant::now();
        let timeout = request.timeout.unwrap_or(self.timeout);
        let response = self.send(request, false).await?;

        let reply: GenerateReply = tokio::time::timeout(timeout, response.json())
            .await
            .map_err(|_| LlmError::timeout(start.elapsed()))?
            .map_err(|e| LlmError::parse(format!("failed to parse response: {}", e)))?;

        let mut generated = GenerateResponse::new(reply.response, start.elapsed());
        if let Some(model) = reply.model {
            generated = generated.with_model(model);
        }
        Ok(generated)
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<TextStream, LlmError> {
        let timeout = request.timeout.unwrap_or(self.timeout);
        let response = self.send(request, true).await?;
        tracing::debug!(model = %self.model, "generation stream opened");
        Ok(decode_ndjson(Box::pin(response.bytes_stream()), timeout))
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        let request = self.client.get(self.tags_url());
        match tokio::time::timeout(Duration::from_secs(5), request.send()).await {
            Ok(Ok(response)) => response.status().is_success(),
            _ => false,
        }
    }
}
