//! Mock LLM provider for testing
//!
//! Responses are produced by a closure that sees the request and the
//! zero-based call number, so tests can script failures on specific calls
//! or derive the reply from the prompt.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{LlmError, Result};
use crate::provider::{LlmProvider, LlmRequest, LlmResponse};

type Responder = Box<dyn Fn(&LlmRequest, usize) -> Result<String> + Send + Sync>;

/// A mock provider for exercising callers without network access
pub struct MockProvider {
    responder: Responder,
    call_count: AtomicUsize,
    name: &'static str,
}

impl MockProvider {
    /// Create a provider from a response function
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&LlmRequest, usize) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            call_count: AtomicUsize::new(0),
            name: "mock",
        }
    }

    /// Create a provider that always succeeds with a fixed response
    pub fn always_succeeds(response: &str) -> Self {
        let response = response.to_string();
        Self::from_fn(move |_, _| Ok(response.clone()))
    }

    /// Create a provider that always fails with an API error
    pub fn always_fails(message: &str) -> Self {
        let message = message.to_string();
        Self::from_fn(move |_, _| {
            Err(LlmError::ApiError {
                message: message.clone(),
                status_code: Some(500),
            })
        })
    }

    /// Create a provider that fails on the listed call numbers and echoes the
    /// last user prompt in upper case otherwise
    pub fn fails_on_calls(calls: &[usize]) -> Self {
        let calls = calls.to_vec();
        Self::from_fn(move |request, call| {
            if calls.contains(&call) {
                return Err(LlmError::ServerOverloaded {
                    message: format!("call {} failed", call),
                });
            }
            Ok(request
                .last_user_prompt()
                .unwrap_or_default()
                .to_uppercase())
        })
    }

    /// Get the number of times complete() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Set a custom provider name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        let content = (self.responder)(&request, call_num)?;

        Ok(LlmResponse {
            content,
            model: "mock-model".to_string(),
            usage: None,
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_succeeds() {
        let provider = MockProvider::always_succeeds("success");

        let result = provider.complete(LlmRequest::prompt("test")).await;
        assert_eq!(result.unwrap().content, "success");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_always_fails() {
        let provider = MockProvider::always_fails("boom");

        for _ in 0..3 {
            let result = provider.complete(LlmRequest::prompt("test")).await;
            assert!(matches!(result, Err(LlmError::ApiError { .. })));
        }
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_fails_on_calls() {
        let provider = MockProvider::fails_on_calls(&[1]);

        let first = provider.complete(LlmRequest::prompt("one")).await;
        assert_eq!(first.unwrap().content, "ONE");

        let second = provider.complete(LlmRequest::prompt("two")).await;
        assert!(second.is_err());

        let third = provider.complete(LlmRequest::prompt("three")).await;
        assert_eq!(third.unwrap().content, "THREE");
        assert_eq!(provider.call_count(), 3);
    }

    #[test]
    fn test_with_name() {
        let provider = MockProvider::always_succeeds("x").with_name("fallback");
        assert_eq!(provider.name(), "fallback");
    }
}
