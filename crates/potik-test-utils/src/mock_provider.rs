// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider for deterministic testing.
//!
//! `MockProvider` implements `LlmProvider` with a FIFO queue of scripted
//! outcomes, enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use potik_core::traits::{CallError, LlmProvider, LlmReply, LlmRequest};

/// A mock LLM provider that pops pre-configured outcomes.
///
/// When the queue is empty, a default "mock response" text is returned.
/// Prompts of every call are recorded for assertions.
pub struct MockProvider {
    name: String,
    outcomes: Mutex<VecDeque<Result<String, CallError>>>,
    prompts: Mutex<Vec<LlmRequest>>,
    calls: AtomicUsize,
    delay_ms: AtomicU64,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::named("mock-provider")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcomes: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
        }
    }

    /// Create a mock provider pre-loaded with successful responses.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let provider = Self::new();
        for response in responses {
            provider.push_response(response);
        }
        provider
    }

    /// Queue a successful response.
    pub fn push_response(&self, text: impl Into<String>) {
        self.outcomes.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue a failure outcome.
    pub fn push_error(&self, error: CallError) {
        self.outcomes.lock().unwrap().push_back(Err(error));
    }

    /// Sleep this long before answering, to exercise timeout paths.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of generate() calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.prompts.lock().unwrap().clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<LlmRequest> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmReply, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.clone());

        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok("mock response".to_string()));

        outcome.map(|content| LlmReply {
            content,
            model: request
                .model
                .clone()
                .unwrap_or_else(|| "mock-model".to_string()),
            provider: self.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_response_when_queue_empty() {
        let provider = MockProvider::new();
        let reply = provider
            .generate(&LlmRequest::prompt(None, "hi"))
            .await
            .unwrap();
        assert_eq!(reply.content, "mock response");
    }

    #[tokio::test]
    async fn queued_outcomes_returned_in_order() {
        let provider = MockProvider::with_responses(vec!["first".into(), "second".into()]);
        provider.push_error(CallError::Retryable("429".into()));

        let req = LlmRequest::prompt(None, "x");
        assert_eq!(provider.generate(&req).await.unwrap().content, "first");
        assert_eq!(provider.generate(&req).await.unwrap().content, "second");
        assert!(provider.generate(&req).await.is_err());
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let provider = MockProvider::new();
        provider
            .generate(&LlmRequest::prompt(Some("SYS".into()), "question"))
            .await
            .unwrap();
        let last = provider.last_request().unwrap();
        assert_eq!(last.system.as_deref(), Some("SYS"));
        assert_eq!(last.messages[0].content, "question");
    }
}
