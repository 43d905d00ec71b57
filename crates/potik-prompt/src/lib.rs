// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph-resident prompt assembly.
//!
//! System prompts are materialized from Role/Task/Protocol/Instruction/Rule
//! nodes in the knowledge graph, cached briefly, and backed by statically
//! compiled Ukrainian defaults for bootstrap.

pub mod assembler;
pub mod defaults;

pub use assembler::{render_template, PromptAssembler};
pub use defaults::{seeds, static_prompt};
