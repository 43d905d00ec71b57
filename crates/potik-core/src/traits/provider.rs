// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM provider seam.
//!
//! Providers return the explicit [`CallError`] result kinds instead of using
//! errors as control flow: the switchboard fails over on `Retryable` and
//! aborts on `Fatal`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome kinds for a single provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Rate limit, transient 5xx, timeout, non-zero exit: try the next provider.
    Retryable(String),
    /// Auth failure or malformed request: abort without failover.
    Fatal(String),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Retryable(reason) => write!(f, "retryable: {reason}"),
            CallError::Fatal(reason) => write!(f, "fatal: {reason}"),
        }
    }
}

impl std::error::Error for CallError {}

/// Role of a chat turn in the provider wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of conversation handed to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Structural contract enforced on a provider reply before it is returned.
///
/// The reply must parse as a JSON object containing every required key.
#[derive(Debug, Clone, Default)]
pub struct ResponseSchema {
    pub required_keys: Vec<String>,
}

impl ResponseSchema {
    pub fn object_with_keys(keys: &[&str]) -> Self {
        Self {
            required_keys: keys.iter().map(|k| (*k).to_string()).collect(),
        }
    }

    /// Checks `content` against the schema. Markdown code fences are the
    /// caller's problem; this sees the raw reply.
    pub fn validate(&self, content: &str) -> Result<(), String> {
        let value: serde_json::Value = serde_json::from_str(content.trim())
            .map_err(|e| format!("reply is not valid JSON: {e}"))?;
        let object = value
            .as_object()
            .ok_or_else(|| "reply is not a JSON object".to_string())?;
        for key in &self.required_keys {
            if !object.contains_key(key) {
                return Err(format!("reply is missing required key `{key}`"));
            }
        }
        Ok(())
    }
}

/// A request routed through the switchboard to some provider.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    /// Per-call model override (e.g. the gatekeeper's cheap local model).
    pub model: Option<String>,
    pub response_schema: Option<ResponseSchema>,
}

impl LlmRequest {
    /// Single-user-turn request, the common case across the streams.
    pub fn prompt(system: Option<String>, user: impl Into<String>) -> Self {
        Self {
            system,
            messages: vec![ChatMessage::user(user)],
            model: None,
            response_schema: None,
        }
    }
}

/// A completed provider reply.
#[derive(Debug, Clone)]
pub struct LlmReply {
    pub content: String,
    pub model: String,
    /// Name of the provider that produced the reply.
    pub provider: String,
}

/// Strips a wrapping markdown code fence from an LLM reply.
///
/// Models regularly wrap JSON in ```` ```json ... ``` ```` despite
/// instructions; validation and parsing always see the inner text.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) up to the first newline.
    let body = match rest.split_once('\n') {
        Some((_info, body)) => body,
        None => rest,
    };
    body.rsplit_once("```")
        .map(|(inner, _)| inner)
        .unwrap_or(body)
        .trim()
}

/// Abstract LLM provider. Two concrete implementations exist: a CLI-spawning
/// provider and an OpenAI-compatible HTTP provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider name used for ordering, cooldown, and logging.
    fn name(&self) -> &str;

    async fn generate(&self, request: &LlmRequest) -> Result<LlmReply, CallError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_accepts_object_with_required_keys() {
        let schema = ResponseSchema::object_with_keys(&["target", "required_depth"]);
        let ok = r#"{"target":"DIRECT","required_depth":"SKIP","tone_hint":"NEUTRAL"}"#;
        assert!(schema.validate(ok).is_ok());
    }

    #[test]
    fn schema_rejects_missing_key() {
        let schema = ResponseSchema::object_with_keys(&["target", "required_depth"]);
        let missing = r#"{"target":"DIRECT"}"#;
        let err = schema.validate(missing).unwrap_err();
        assert!(err.contains("required_depth"), "got: {err}");
    }

    #[test]
    fn schema_rejects_non_json() {
        let schema = ResponseSchema::object_with_keys(&["topics"]);
        assert!(schema.validate("topics: Docker").is_err());
    }

    #[test]
    fn schema_rejects_non_object() {
        let schema = ResponseSchema::object_with_keys(&["topics"]);
        assert!(schema.validate("[1,2,3]").is_err());
    }

    #[test]
    fn strip_fences_handles_info_string() {
        let fenced = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\":1}");
    }

    #[test]
    fn strip_fences_passes_plain_text_through() {
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn strip_fences_handles_bare_fence() {
        assert_eq!(strip_code_fences("```\n42\n```"), "42");
    }

    #[test]
    fn call_error_display() {
        assert_eq!(
            CallError::Retryable("429".into()).to_string(),
            "retryable: 429"
        );
        assert_eq!(CallError::Fatal("auth".into()).to_string(), "fatal: auth");
    }
}
