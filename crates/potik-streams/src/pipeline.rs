// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring of the five streams into running worker pools.
//!
//! Each stage is a pool of long-running tasks consuming one channel of the
//! stream bus and publishing downstream. Workers absorb application errors
//! (they log and continue); only cancellation stops them.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use potik_bus::{QueueReceiver, StreamBus};
use potik_config::PotikConfig;
use potik_core::traits::Transport;
use potik_core::types::IngestEvent;
use potik_core::PotikError;
use potik_graph::GraphStore;
use potik_prompt::PromptAssembler;
use potik_switchboard::Switchboard;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::analyst::Analyst;
use crate::coordinator::Coordinator;
use crate::gatekeeper::Gatekeeper;
use crate::researcher::Researcher;
use crate::responder::Responder;
use crate::scribe::Scribe;
use crate::thinker::Thinker;
use crate::thought_log::ThoughtLogWriter;

/// Capacity of the fire-and-forget thought-log queue.
const THOUGHT_LOG_CAPACITY: usize = 256;

/// A running pipeline: the bus plus every spawned worker.
pub struct Pipeline {
    pub bus: StreamBus,
    handles: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Builds the bus, constructs every stage, and spawns the worker pools
    /// sized by configuration.
    pub fn spawn(
        config: &PotikConfig,
        store: Arc<dyn GraphStore>,
        switchboard: Arc<Switchboard>,
        assembler: Arc<PromptAssembler>,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
    ) -> Self {
        let bus = StreamBus::new(&config.streams);
        let thought_log =
            ThoughtLogWriter::spawn(store.clone(), THOUGHT_LOG_CAPACITY, cancel.clone());

        let scribe = Arc::new(Scribe::new(store.clone(), bus.triage.sender.clone()));
        let gatekeeper = Arc::new(Gatekeeper::new(
            store.clone(),
            switchboard.clone(),
            assembler.clone(),
            bus.analysis.sender.clone(),
            bus.planning.sender.clone(),
            config.gatekeeper.model.clone(),
            config.agent.name.clone(),
        ));
        let thinker = Arc::new(Thinker::new(
            store.clone(),
            switchboard.clone(),
            assembler.clone(),
            thought_log,
            bus.enrichment.sender.clone(),
            bus.planning.sender.clone(),
            config.thinker.history_k,
        ));
        let analyst = Arc::new(Analyst::new(
            store.clone(),
            switchboard.clone(),
            assembler.clone(),
            bus.execution.sender.clone(),
        ));
        let researcher = Arc::new(Researcher::new(
            store.clone(),
            switchboard.clone(),
            assembler.clone(),
        ));
        let coordinator = Arc::new(Coordinator::new(
            store.clone(),
            researcher,
            bus.response.sender.clone(),
            Duration::from_secs(config.coordinator.task_timeout_seconds),
        ));
        let responder = Arc::new(Responder::new(
            store,
            switchboard,
            assembler,
            transport,
            bus.ingestion.sender.clone(),
            config.agent.telegram_id,
        ));

        let mut handles = Vec::new();

        let scribe_enrich = scribe.clone();
        spawn_pool(
            &mut handles,
            "scribe",
            config.streams.scribe.workers,
            bus.ingestion.receiver.clone(),
            &cancel,
            move |event| {
                let scribe = scribe.clone();
                async move { scribe.handle_event(event).await }
            },
        );

        // Enrichment sidecar: same Scribe, its own loop. Enrichment writes
        // are idempotent and need no per-chat ordering.
        spawn_pool(
            &mut handles,
            "scribe-enrichment",
            config.streams.scribe.workers,
            bus.enrichment.receiver.clone(),
            &cancel,
            move |enrichment| {
                let scribe = scribe_enrich.clone();
                async move { scribe.handle_enrichment(enrichment).await }
            },
        );

        spawn_pool(
            &mut handles,
            "gatekeeper",
            config.streams.gatekeeper.workers,
            bus.triage.receiver.clone(),
            &cancel,
            move |job| {
                let gatekeeper = gatekeeper.clone();
                async move { gatekeeper.handle(job).await }
            },
        );

        spawn_pool(
            &mut handles,
            "thinker",
            config.streams.thinker.workers,
            bus.analysis.receiver.clone(),
            &cancel,
            move |job| {
                let thinker = thinker.clone();
                async move { thinker.handle(job).await }
            },
        );

        spawn_pool(
            &mut handles,
            "analyst",
            config.streams.analyst.workers,
            bus.planning.receiver.clone(),
            &cancel,
            move |job| {
                let analyst = analyst.clone();
                async move { analyst.handle(job).await }
            },
        );

        spawn_pool(
            &mut handles,
            "coordinator",
            config.streams.coordinator.workers,
            bus.execution.receiver.clone(),
            &cancel,
            move |snapshot| {
                let coordinator = coordinator.clone();
                async move { coordinator.handle(snapshot).await }
            },
        );

        spawn_pool(
            &mut handles,
            "responder",
            config.streams.responder.workers,
            bus.response.receiver.clone(),
            &cancel,
            move |bundle| {
                let responder = responder.clone();
                async move { responder.handle(bundle).await }
            },
        );

        Self { bus, handles }
    }

    /// Delivers one inbound event to the pipeline (the transport adapter's
    /// entry point).
    pub async fn deliver_event(&self, event: IngestEvent) -> Result<(), PotikError> {
        self.bus.ingestion.sender.send(event).await.map(|_| ())
    }

    /// Waits for every worker to finish. Callers cancel the shared token
    /// first; this drains in-flight work.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

/// Spawn `count` workers draining `receiver` through `handler`.
fn spawn_pool<T, F, Fut>(
    handles: &mut Vec<JoinHandle<()>>,
    stream: &'static str,
    count: usize,
    receiver: QueueReceiver<T>,
    cancel: &CancellationToken,
    handler: F,
) where
    T: Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    for worker in 0..count.max(1) {
        let receiver = receiver.clone();
        let cancel = cancel.clone();
        let handler = handler.clone();
        handles.push(tokio::spawn(async move {
            debug!(stream, worker, "worker started");
            while let Some(item) = receiver.recv_cancellable(&cancel).await {
                handler(item).await;
            }
            debug!(stream, worker, "worker stopped");
        }));
    }
}
