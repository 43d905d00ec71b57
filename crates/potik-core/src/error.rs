// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Potik cognitive pipeline.

use thiserror::Error;

/// The primary error type used across all Potik crates.
#[derive(Debug, Error)]
pub enum PotikError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Graph store errors (connection failure, query failure, bad reply shape).
    #[error("graph error: {message}")]
    Graph {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors surfaced after switchboard failover is exhausted.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM output failed structural validation (malformed JSON, invalid plan,
    /// forbidden research query).
    #[error("validation error: {0}")]
    Validation(String),

    /// A stream bus channel is closed or an enqueue was shed.
    #[error("queue error on channel {channel}: {message}")]
    Queue { channel: String, message: String },

    /// Operation exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The prompt subgraph has no Role node with the requested name and no
    /// static fallback exists for it.
    #[error("role not found in prompt graph: {role}")]
    RoleNotFound { role: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PotikError {
    /// Shorthand for a graph error without an underlying source.
    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }
}
