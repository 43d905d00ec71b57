// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock outbound transport recording every sent message.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use potik_core::traits::Transport;
use potik_core::PotikError;

/// In-memory transport: records sends and assigns increasing message ids.
pub struct MockTransport {
    sent: Mutex<Vec<(i64, String)>>,
    next_id: AtomicI64,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            // Transport-assigned ids start well away from test fixture ids.
            next_id: AtomicI64::new(10_000),
        }
    }

    /// All `(chat_id, text)` pairs sent so far.
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, PotikError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}
