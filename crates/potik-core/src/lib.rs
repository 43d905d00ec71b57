// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Potik cognitive stream pipeline.
//!
//! This crate provides the error type, the domain types that cross the
//! stream bus, and the trait seams toward LLM providers and the chat
//! transport. Every other workspace crate builds on these definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::PotikError;
pub use traits::{
    strip_code_fences, CallError, ChatMessage, ChatRole, LlmProvider, LlmReply, LlmRequest,
    ResponseSchema, Transport,
};
pub use types::{
    AnalysisJob, AnalystSnapshot, ChatKind, ContextBundle, Enrichment, EntityKind, EntityRef,
    EventSource, GateDepth, GateTarget, GateVerdict, IngestEvent, Intent, MediaKind, MessageUid,
    OutboundMessage, PlanTask, PlanningJob, TaskAction, TaskStatus, ToneHint, ToolOutput,
    TopicRef, TriageJob,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_construct() {
        let _config = PotikError::Config("test".into());
        let _graph = PotikError::graph("down");
        let _provider = PotikError::provider("429");
        let _validation = PotikError::Validation("bad json".into());
        let _queue = PotikError::Queue {
            channel: "triage".into(),
            message: "closed".into(),
        };
        let _timeout = PotikError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _role = PotikError::RoleNotFound {
            role: "Thinker".into(),
        };
        let _internal = PotikError::Internal("test".into());
    }

    #[test]
    fn event_source_round_trips() {
        use std::str::FromStr;
        for source in [EventSource::User, EventSource::Agent] {
            let s = source.to_string();
            assert_eq!(EventSource::from_str(&s).unwrap(), source);
        }
    }

    #[test]
    fn skip_verdict_is_skip() {
        assert!(GateVerdict::skip().is_skip());
        assert!(!GateVerdict::media_direct().is_skip());
    }
}
