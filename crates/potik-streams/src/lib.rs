// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The five cognitive streams of the Potik pipeline.
//!
//! Scribe persists, Gatekeeper triages, Thinker enriches, Analyst plans,
//! Coordinator executes, Responder replies — connected by the stream bus,
//! grounded in the knowledge graph, and speaking through the provider
//! switchboard. [`pipeline::Pipeline`] wires them into running worker pools.

pub mod analyst;
pub mod coordinator;
pub mod gatekeeper;
pub mod pipeline;
pub mod researcher;
pub mod responder;
pub mod scribe;
pub mod thinker;
pub mod thought_log;
pub mod validate;

pub use analyst::Analyst;
pub use coordinator::Coordinator;
pub use gatekeeper::Gatekeeper;
pub use pipeline::Pipeline;
pub use researcher::Researcher;
pub use responder::Responder;
pub use scribe::Scribe;
pub use thinker::Thinker;
pub use thought_log::ThoughtLogWriter;
