// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph store access for the Potik pipeline.
//!
//! The knowledge graph is a temporal, append-only multi-graph behind a
//! FalkorDB-style `GRAPH.QUERY` endpoint. Two logical graphs are used:
//! `PrimaryMemory` for observational facts and semantic enrichment, and
//! `ThoughtLog` for reasoning-process records.

pub mod client;
pub mod falkor;
pub mod locks;
pub mod schema;
pub mod store;
pub mod value;

pub use client::GraphClient;
pub use falkor::{normalize_title, FalkorStore};
pub use locks::ChatLocks;
pub use store::{
    ContextLine, GraphStore, PromptAtom, PromptSeed, SeedInstruction, SeedRule, StoredMessage,
    TopicInfo,
};
pub use value::GraphReply;
