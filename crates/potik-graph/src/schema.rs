// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema constraints for the knowledge graph.
//!
//! Uniqueness is enforced at the store for every natural key the pipeline
//! upserts by, so idempotent MERGE semantics hold under concurrency.

/// `(label, property)` pairs that must be unique in the primary graph.
pub const PRIMARY_CONSTRAINTS: &[(&str, &str)] = &[
    ("User", "telegram_id"),
    ("Agent", "telegram_id"),
    ("Chat", "chat_id"),
    ("Message", "uid"),
    ("Day", "date"),
    ("Year", "value"),
    ("Topic", "title"),
    ("Entity", "name"),
    // Prompt subgraph natural keys (unique per label).
    ("Role", "name"),
    ("Task", "name"),
    ("Protocol", "name"),
    ("Instruction", "name"),
    ("Rule", "name"),
];
