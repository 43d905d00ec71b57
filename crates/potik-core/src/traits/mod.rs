// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the pipeline and its external collaborators.

pub mod provider;
pub mod transport;

pub use provider::{
    strip_code_fences, CallError, ChatMessage, ChatRole, LlmProvider, LlmReply, LlmRequest,
    ResponseSchema,
};
pub use transport::Transport;
