// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI-driven LLM provider.
//!
//! Spawns a configured command per completion, writes the rendered prompt to
//! its stdin, and reads the completion from stdout. A non-zero exit code is
//! a retryable failure so the switchboard can fail over; only a missing
//! binary is fatal, since retrying cannot fix it.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use potik_config::model::CliProviderConfig;
use potik_core::traits::{CallError, ChatRole, LlmProvider, LlmReply, LlmRequest};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Provider that shells out to a local CLI (e.g. a `gemini` binary).
pub struct CliProvider {
    name: String,
    config: CliProviderConfig,
}

impl CliProvider {
    pub fn new(name: impl Into<String>, config: CliProviderConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

#[async_trait]
impl LlmProvider for CliProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmReply, CallError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());

        // `{model}` in configured args is substituted with the effective model.
        let args: Vec<String> = self
            .config
            .args
            .iter()
            .map(|arg| arg.replace("{model}", &model))
            .collect();

        let mut child = tokio::process::Command::new(&self.config.command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CallError::Fatal(format!(
                    "command `{}` not found",
                    self.config.command
                )),
                _ => CallError::Retryable(format!("failed to spawn provider process: {e}")),
            })?;

        let prompt = render_prompt(request);
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| CallError::Retryable(format!("failed to write prompt: {e}")))?;
            // Close stdin so the process sees EOF and starts completing.
            drop(stdin);
        }

        let deadline = Duration::from_secs(self.config.timeout_seconds);
        let output = tokio::time::timeout(deadline, child.wait_with_output())
            .await
            .map_err(|_| CallError::Retryable(format!("provider timed out after {deadline:?}")))?
            .map_err(|e| CallError::Retryable(format!("provider process failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CallError::Retryable(format!(
                "provider exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let content = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(provider = self.name.as_str(), bytes = content.len(), "cli completion received");

        Ok(LlmReply {
            content,
            model,
            provider: self.name.clone(),
        })
    }
}

/// Renders the request into plain text for stdin: system block first, then
/// turns. Role prefixes only appear for multi-turn histories.
fn render_prompt(request: &LlmRequest) -> String {
    let mut out = String::new();
    if let Some(system) = &request.system {
        out.push_str(system);
        out.push_str("\n\n");
    }

    if request.messages.len() == 1 {
        out.push_str(&request.messages[0].content);
    } else {
        for message in &request.messages {
            let role = match message.role {
                ChatRole::System => "system",
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            out.push_str(&format!("[{role}]: {}\n", message.content));
        }
    }
    out
}
