//! LLM provider abstraction
//!
//! The conversation loop only needs single-prompt completions with a token
//! count. GigaChat is the one production provider.

mod error;
mod gigachat;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use gigachat::GigaChatService;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    prompt_tokens = response.usage.prompt_tokens,
                    completion_tokens = response.usage.completion_tokens,
                    total_tokens = response.usage.total_tokens,
                    finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    transient = e.kind.is_transient(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedService(Result<LlmResponse, LlmError>);

    #[async_trait]
    impl LlmService for FixedService {
        async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            self.0.clone()
        }

        fn model_id(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_logging_service_passes_through() {
        let ok = LoggingService::new(Arc::new(FixedService(Ok(LlmResponse {
            text: "hi".to_string(),
            finish_reason: Some("length".to_string()),
            ..LlmResponse::default()
        }))));
        assert_eq!(ok.model_id(), "fixed");
        let response = ok.complete(&LlmRequest::user("x")).await.unwrap();
        assert_eq!(response.text, "hi");
        assert_eq!(response.finish_reason.as_deref(), Some("length"));

        let failing =
            LoggingService::new(Arc::new(FixedService(Err(LlmError::rate_limit("slow down")))));
        let err = failing.complete(&LlmRequest::user("x")).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::RateLimit);
    }
}
