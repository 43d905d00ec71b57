// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Default outbound transport boundary.
//!
//! The Telegram adapter runs outside this process and attaches through the
//! `Transport` trait. Until one is wired in, outbound messages are logged
//! and assigned monotonically increasing ids so the feedback loop (and the
//! rest of the pipeline) behaves identically.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use potik_core::traits::Transport;
use potik_core::PotikError;
use tracing::info;

/// Log-only transport standing in for the external Telegram adapter.
pub struct LogTransport {
    next_id: AtomicI64,
}

impl LogTransport {
    pub fn new() -> Self {
        Self {
            // High base keeps synthetic ids out of Telegram's id range.
            next_id: AtomicI64::new(1_000_000),
        }
    }
}

impl Default for LogTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LogTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, PotikError> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        info!(chat_id, message_id, text, "outbound message");
        Ok(message_id)
    }
}
