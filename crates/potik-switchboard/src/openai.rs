// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible chat-completions provider.
//!
//! Speaks the `/chat/completions` contract, which is also served by local
//! runtimes (Ollama, llama.cpp), so the same provider covers both the cloud
//! fallback and the gatekeeper's cheap local model.

use std::time::Duration;

use async_trait::async_trait;
use potik_config::model::OpenAiProviderConfig;
use potik_core::traits::{CallError, ChatRole, LlmProvider, LlmReply, LlmRequest};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// HTTP provider implementing the OpenAI-style chat completions contract.
pub struct OpenAiProvider {
    name: String,
    client: reqwest::Client,
    config: OpenAiProviderConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

impl OpenAiProvider {
    pub fn new(
        name: impl Into<String>,
        config: OpenAiProviderConfig,
    ) -> Result<Self, potik_core::PotikError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| potik_core::PotikError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            name: name.into(),
            client,
            config,
        })
    }

    fn wire_messages(request: &LlmRequest) -> Vec<WireMessage> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        for message in &request.messages {
            let role = match message.role {
                ChatRole::System => "system",
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            messages.push(WireMessage {
                role: role.to_string(),
                content: message.content.clone(),
            });
        }
        messages
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmReply, CallError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());
        let body = ChatCompletionRequest {
            model: &model,
            messages: Self::wire_messages(request),
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut builder = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| {
            // Network failures and client-side timeouts are transient.
            CallError::Retryable(format!("HTTP request failed: {e}"))
        })?;

        let status = response.status();
        debug!(provider = self.name.as_str(), status = %status, "completion response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = format!("API returned {status}: {}", body.trim());
            return if is_transient_status(status) {
                Err(CallError::Retryable(reason))
            } else {
                Err(CallError::Fatal(reason))
            };
        }

        let body = response
            .text()
            .await
            .map_err(|e| CallError::Retryable(format!("failed to read response body: {e}")))?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| CallError::Retryable(format!("failed to parse API response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CallError::Retryable("API response contained no choices".into()))?;

        Ok(LlmReply {
            content: choice.message.content,
            model: parsed.model.unwrap_or(model),
            provider: self.name.clone(),
        })
    }
}

/// Transient statuses worth failing over on: rate limits and server errors.
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}
