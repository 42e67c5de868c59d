//! Retry wrapper with exponential backoff

use super::types::{
    GenerateRequest, GenerateResponse, LlmClient, LlmError, RetryPolicy, TextStream,
};
use async_trait::async_trait;
use std::future::Future;

/// Wrapper that adds retry logic to any LLM client
///
/// Streams are only retried while the connection is being opened; once
/// chunks flow, failures are reported to the caller as they are.
pub struct RetryClient<T: LlmClient> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: LlmClient> RetryClient<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn run<'a, R, F, Fut>(&'a self, mut attempt_fn: F) -> Result<R, LlmError>
    where
        F: FnMut(&'a T) -> Fut,
        Fut: Future<Output = Result<R, LlmError>>,
    {
        let mut attempt = 0;
        loop {
            match attempt_fn(&self.inner).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retryable() || attempt >= self.policy.max_retries {
                        return Err(e);
                    }

                    let delay = e
                        .retry_after()
                        .unwrap_or_else(|| self.policy.delay_for_attempt(attempt));
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        "LLM request failed, retrying in {:?}",
                        delay
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<T: LlmClient + 'static> LlmClient for RetryClient<T> {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
        self.run(|inner| inner.generate(request)).await
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<TextStream, LlmError> {
        self.run(|inner| inner.generate_stream(request)).await
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }
}

/// Create a retry client with custom policy
pub fn with_retry<T: LlmClient + 'static>(client: T, policy: RetryPolicy) -> RetryClient<T> {
    RetryClient::new(client, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Mock client that fails a specified number of times before succeeding
    struct FlakyClient {
        calls: AtomicU32,
        fail_times: u32,
        error: LlmError,
    }

    impl FlakyClient {
        fn new(fail_times: u32, error: LlmError) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_times,
                error,
            }
        }

        fn retryable(fail_times: u32) -> Self {
            Self::new(fail_times, LlmError::network("connection refused"))
        }

        fn next(&self) -> Result<(), LlmError> {
            let count = self.calls.fetch_add(1, Ordering::SeqCst);
            if count < self.fail_times {
                Err(self.error.clone())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl LlmClient for FlakyClient {
        async fn generate(
            &self,
            _request: &GenerateRequest,
        ) -> Result<GenerateResponse, LlmError> {
            self.next()?;
            Ok(GenerateResponse::new("ok".into(), Duration::from_millis(5)))
        }

        async fn generate_stream(
            &self,
            _request: &GenerateRequest,
        ) -> Result<TextStream, LlmError> {
            self.next()?;
            Ok(Box::pin(futures::stream::iter(vec![Ok("ok".to_string())])))
        }

        fn model(&self) -> &str {
            "flaky"
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            jitter: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let client = RetryClient::new(FlakyClient::retryable(2), fast_policy(3));
        let result = client.generate(&GenerateRequest::new("test", 0.1)).await;
        assert!(result.is_ok());
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let client = RetryClient::new(FlakyClient::retryable(10), fast_policy(2));
        let result = client.generate(&GenerateRequest::new("test", 0.1)).await;
        assert!(matches!(result, Err(LlmError::Network { .. })));
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_non_retryable() {
        let flaky = FlakyClient::new(
            10,
            LlmError::Rejected {
                status: 404,
                message: "model not found".into(),
            },
        );
        let client = RetryClient::new(flaky, fast_policy(5));
        let result = client.generate(&GenerateRequest::new("test", 0.1)).await;
        assert!(matches!(result, Err(LlmError::Rejected { .. })));
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stream_open_is_retried() {
        let client = with_retry(FlakyClient::retryable(1), fast_policy(1));
        let result = client.generate_stream(&GenerateRequest::new("test", 0.1)).await;
        assert!(result.is_ok());
        assert_eq!(client.model(), "flaky");
    }

    #[tokio::test]
    async fn test_zero_retries_passes_through() {
        let client = RetryClient::new(FlakyClient::retryable(1), fast_policy(0));
        let result = client.generate(&GenerateRequest::new("test", 0.1)).await;
        assert!(result.is_err());
    }
}
