// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget writer for the ThoughtLog graph.
//!
//! Reasoning-process records (raw prompt/response pairs) must never slow a
//! stream down: writes go through a bounded channel to a single background
//! task and are dropped with a debug log when the channel is full.

use std::sync::Arc;

use potik_graph::GraphStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct LogJob {
    prompt: String,
    response: String,
    model: String,
}

/// Handle for enqueueing thought-log writes. Cheap to clone.
#[derive(Clone)]
pub struct ThoughtLogWriter {
    tx: mpsc::Sender<LogJob>,
}

impl ThoughtLogWriter {
    /// Spawns the background writer task and returns the handle.
    pub fn spawn(
        store: Arc<dyn GraphStore>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<LogJob>(capacity.max(1));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    job = rx.recv() => {
                        let Some(job) = job else { break };
                        if let Err(e) = store
                            .log_thought(&job.prompt, &job.response, &job.model)
                            .await
                        {
                            warn!(error = %e, "thought log write failed");
                        }
                    }
                }
            }
            debug!("thought log writer stopped");
        });

        Self { tx }
    }

    /// Enqueue one prompt/response pair; drops the record when the queue is
    /// full rather than blocking the calling stream.
    pub fn record(&self, prompt: &str, response: &str, model: &str) {
        let job = LogJob {
            prompt: prompt.to_string(),
            response: response.to_string(),
            model: model.to_string(),
        };
        if self.tx.try_send(job).is_err() {
            debug!("thought log queue full, dropping record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use potik_test_utils::MemoryGraph;
    use std::time::Duration;

    #[tokio::test]
    async fn records_are_written_in_background() {
        let store = Arc::new(MemoryGraph::new());
        let writer = ThoughtLogWriter::spawn(store.clone(), 16, CancellationToken::new());

        writer.record("prompt", "response", "gemini-2.5-flash");

        // Give the background task a moment to drain.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let entries = store.log_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, "response");
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let store = Arc::new(MemoryGraph::new());
        let cancel = CancellationToken::new();
        cancel.cancel(); // writer exits immediately, nothing drains
        let writer = ThoughtLogWriter::spawn(store, 1, cancel);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Must return instantly even though nothing is consuming.
        writer.record("a", "b", "m");
        writer.record("c", "d", "m");
    }
}
