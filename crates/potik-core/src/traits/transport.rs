// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound transport seam.
//!
//! The Telegram adapter lives outside this workspace; the Responder only
//! needs the ability to deliver text to a chat and learn the id the
//! transport assigned, so the looped-back agent message carries a real
//! `message_id`.

use async_trait::async_trait;

use crate::error::PotikError;

/// Outbound message delivery to the chat transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers `text` to `chat_id` and returns the transport-assigned
    /// message id.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, PotikError>;
}
