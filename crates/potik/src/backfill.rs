// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `potik backfill` command implementation.
//!
//! Replays recently persisted messages through the Thinker so topics,
//! entities, and narratives exist for history that predates the semantic
//! layer. Planning output is discarded; only enrichment is applied.

use std::sync::Arc;
use std::time::Duration;

use potik_bus::{channel, OverflowPolicy};
use potik_config::PotikConfig;
use potik_core::types::{
    AnalysisJob, ChatKind, EventSource, GateDepth, GateTarget, GateVerdict, IngestEvent, ToneHint,
};
use potik_core::PotikError;
use potik_graph::{FalkorStore, GraphClient, GraphStore};
use potik_prompt::PromptAssembler;
use potik_streams::{Thinker, ThoughtLogWriter};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Reprocesses the `limit` most recent messages through the Thinker.
pub async fn run(config: PotikConfig, limit: usize) -> Result<(), PotikError> {
    let client = GraphClient::connect(&config.graph.url()).await?;
    let store: Arc<dyn GraphStore> = Arc::new(FalkorStore::new(
        client,
        config.graph.primary_name.clone(),
        config.graph.thoughtlog_name.clone(),
        config.agent.telegram_id,
        config.agent.name.clone(),
    ));
    store.ping().await?;

    let switchboard = Arc::new(
        potik_switchboard::build_switchboard(&config.providers)?.with_graph_logger(store.clone()),
    );
    let assembler = Arc::new(PromptAssembler::new(
        store.clone(),
        Duration::from_secs(config.prompt.cache_ttl_seconds),
    ));

    let cancel = CancellationToken::new();
    let thought_log = ThoughtLogWriter::spawn(store.clone(), 256, cancel.clone());
    let (enrichment_tx, enrichment_rx) = channel("enrichment", 64, OverflowPolicy::Block);
    let (planning_tx, planning_rx) = channel("planning", 64, OverflowPolicy::Block);
    let thinker = Thinker::new(
        store.clone(),
        switchboard,
        assembler,
        thought_log,
        enrichment_tx,
        planning_tx,
        config.thinker.history_k,
    );

    let mut messages = store.recent_messages(limit).await?;
    // Oldest first, so narratives build on already-reprocessed context.
    messages.reverse();
    info!(count = messages.len(), "backfilling messages through the thinker");

    let mut enriched = 0usize;
    for message in &messages {
        let job = AnalysisJob {
            uid: message.uid.clone(),
            event: IngestEvent {
                chat_id: message.chat_id,
                message_id: message.message_id,
                source: EventSource::User,
                sender_id: 0,
                sender_name: None,
                chat_kind: ChatKind::Group,
                text: message.text.clone(),
                timestamp: message.created_at,
                media: None,
            },
            gate: GateVerdict {
                target: GateTarget::Contextual,
                required_depth: GateDepth::DeepAnalysis,
                tone_hint: ToneHint::Neutral,
            },
        };
        thinker.handle(job).await;

        // Apply whatever enrichment the pass produced; planning output is
        // not executed during backfill.
        while let Some(enrichment) = enrichment_rx.try_recv().await {
            if !enrichment.topics.is_empty() || !enrichment.entities.is_empty() {
                store.apply_enrichment(&enrichment).await?;
                enriched += 1;
            }
        }
        while planning_rx.try_recv().await.is_some() {}
    }

    cancel.cancel();
    info!(processed = messages.len(), enriched, "backfill complete");
    println!("backfill: {} messages processed, {enriched} enriched", messages.len());
    Ok(())
}
