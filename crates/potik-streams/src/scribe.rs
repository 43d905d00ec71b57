// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream 1: the Scribe.
//!
//! Single source of truth for graph writes derived from raw events. One
//! ingestion worker keeps per-chat write order strict; a sidecar worker
//! applies semantic enrichment coming back from the Thinker. A message that
//! cannot be persisted after retries is logged `unpersisted` and dropped;
//! the pipeline must not stall.

use std::sync::Arc;

use potik_bus::QueueSender;
use potik_core::types::{Enrichment, EventSource, IngestEvent, TriageJob};
use potik_graph::GraphStore;
use tracing::{debug, error, info};

/// Stream 1 worker: persists events and enrichment.
pub struct Scribe {
    store: Arc<dyn GraphStore>,
    triage: QueueSender<TriageJob>,
}

impl Scribe {
    pub fn new(store: Arc<dyn GraphStore>, triage: QueueSender<TriageJob>) -> Self {
        Self { store, triage }
    }

    /// Persists one raw event and forwards it to triage.
    ///
    /// The store retries transient failures internally; a final failure is
    /// absorbed here so the worker loop keeps consuming.
    pub async fn handle_event(&self, event: IngestEvent) {
        if !event.has_valid_timestamp() {
            error!(chat_id = event.chat_id, message_id = event.message_id,
                   "dropping event with invalid timestamp");
            return;
        }

        match self.store.persist_event(&event).await {
            Ok(uid) => {
                potik_metrics::record_persisted(&event.source.to_string());
                info!(%uid, "event persisted");
                // The agent's own loop-backs are history, not stimuli:
                // triaging them would let the agent converse with itself.
                if event.source == EventSource::Agent {
                    return;
                }
                if let Err(e) = self.triage.send(TriageJob { uid, event }).await {
                    error!(error = %e, "triage channel unavailable");
                }
            }
            Err(e) => {
                potik_metrics::record_unpersisted();
                error!(
                    chat_id = event.chat_id,
                    message_id = event.message_id,
                    error = %e,
                    "message unpersisted after retries"
                );
            }
        }
    }

    /// Applies one enrichment payload. Idempotent; errors are absorbed.
    pub async fn handle_enrichment(&self, enrichment: Enrichment) {
        if enrichment.topics.is_empty() && enrichment.entities.is_empty() {
            debug!(uid = %enrichment.msg_uid, "empty enrichment, nothing to apply");
            return;
        }
        if let Err(e) = self.store.apply_enrichment(&enrichment).await {
            error!(uid = %enrichment.msg_uid, error = %e, "failed to apply enrichment");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use potik_bus::{channel, OverflowPolicy};
    use potik_core::types::{ChatKind, EntityKind, EntityRef, EventSource, MessageUid, TopicRef};
    use potik_test_utils::MemoryGraph;

    fn event(message_id: i64, ts: f64) -> IngestEvent {
        IngestEvent {
            chat_id: 1,
            message_id,
            source: EventSource::User,
            sender_id: 42,
            sender_name: Some("Maks".into()),
            chat_kind: ChatKind::Group,
            text: "привіт".into(),
            timestamp: ts,
            media: None,
        }
    }

    #[tokio::test]
    async fn persists_and_forwards_to_triage() {
        let store = Arc::new(MemoryGraph::new());
        let (triage_tx, triage_rx) = channel("triage", 8, OverflowPolicy::Block);
        let scribe = Scribe::new(store.clone(), triage_tx);

        scribe.handle_event(event(100, 10.0)).await;

        assert!(store.message(&MessageUid::new(1, 100)).is_some());
        let job = triage_rx.recv().await.unwrap();
        assert_eq!(job.uid.0, "1:100");
    }

    #[tokio::test]
    async fn duplicate_event_is_noop_but_still_triaged() {
        let store = Arc::new(MemoryGraph::new());
        let (triage_tx, triage_rx) = channel("triage", 8, OverflowPolicy::Block);
        let scribe = Scribe::new(store.clone(), triage_tx);

        scribe.handle_event(event(100, 10.0)).await;
        scribe.handle_event(event(100, 10.0)).await;

        assert_eq!(store.messages().len(), 1);
        // At-least-once delivery downstream is fine: writes are idempotent.
        assert!(triage_rx.recv().await.is_some());
        assert!(triage_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn persist_failure_does_not_stall_the_worker() {
        let store = Arc::new(MemoryGraph::new());
        let (triage_tx, triage_rx) = channel("triage", 8, OverflowPolicy::Block);
        let scribe = Scribe::new(store.clone(), triage_tx);

        store.fail_next_persists(1);
        scribe.handle_event(event(1, 10.0)).await;
        scribe.handle_event(event(2, 11.0)).await;

        // First message was lost (logged unpersisted), second made it.
        assert_eq!(store.messages().len(), 1);
        assert_eq!(triage_rx.recv().await.unwrap().uid.0, "1:2");
    }

    #[tokio::test]
    async fn agent_loopback_is_persisted_but_not_triaged() {
        let store = Arc::new(MemoryGraph::new());
        let (triage_tx, triage_rx) = channel("triage", 8, OverflowPolicy::Block);
        let scribe = Scribe::new(store.clone(), triage_tx);

        let mut agent_event = event(500, 20.0);
        agent_event.source = EventSource::Agent;
        scribe.handle_event(agent_event).await;

        assert!(store.message(&MessageUid::new(1, 500)).is_some());
        assert!(triage_rx.try_recv().await.is_none());
    }

    #[tokio::test]
    async fn enrichment_is_applied_to_store() {
        let store = Arc::new(MemoryGraph::new());
        let (triage_tx, _triage_rx) = channel("triage", 8, OverflowPolicy::Block);
        let scribe = Scribe::new(store.clone(), triage_tx);

        scribe.handle_event(event(100, 10.0)).await;
        scribe
            .handle_enrichment(Enrichment {
                msg_uid: MessageUid::new(1, 100),
                topics: vec![TopicRef {
                    title: "Docker".into(),
                    is_new: true,
                }],
                entities: vec![EntityRef {
                    name: "Docker".into(),
                    kind: EntityKind::Technology,
                }],
                narrative: "обговорення docker".into(),
            })
            .await;

        assert_eq!(store.topic_count(), 1);
        assert_eq!(store.entity_type("Docker").unwrap(), "Technology");
    }
}
