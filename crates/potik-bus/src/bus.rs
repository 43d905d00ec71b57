// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The stream bus: every named channel between pipeline stages.
//!
//! | Channel      | Producer              | Consumer    |
//! |--------------|-----------------------|-------------|
//! | `ingestion`  | transport, Responder  | Scribe      |
//! | `triage`     | Scribe                | Gatekeeper  |
//! | `analysis`   | Gatekeeper            | Thinker     |
//! | `enrichment` | Thinker               | Scribe      |
//! | `planning`   | Gatekeeper or Thinker | Analyst     |
//! | `execution`  | Analyst               | Coordinator |
//! | `response`   | Coordinator           | Responder   |
//!
//! `ingestion` blocks under backpressure (raw events are never dropped);
//! `enrichment` is the lowest-priority channel and sheds first.

use potik_config::model::StreamsConfig;
use potik_core::types::{
    AnalysisJob, AnalystSnapshot, ContextBundle, Enrichment, IngestEvent, PlanningJob, TriageJob,
};

use crate::queue::{channel, OverflowPolicy, QueueReceiver, QueueSender};

/// Shed attempts for best-effort channels before the payload is dropped.
const SHED_ATTEMPTS: u32 = 8;

/// Both halves of one named channel.
pub struct Channel<T> {
    pub sender: QueueSender<T>,
    pub receiver: QueueReceiver<T>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

fn make<T>(name: &'static str, capacity: usize, policy: OverflowPolicy) -> Channel<T> {
    let (sender, receiver) = channel(name, capacity, policy);
    Channel { sender, receiver }
}

/// All channels of the pipeline. Clones share the underlying queues.
#[derive(Clone)]
pub struct StreamBus {
    pub ingestion: Channel<IngestEvent>,
    pub triage: Channel<TriageJob>,
    pub analysis: Channel<AnalysisJob>,
    pub enrichment: Channel<Enrichment>,
    pub planning: Channel<PlanningJob>,
    pub execution: Channel<AnalystSnapshot>,
    pub response: Channel<ContextBundle>,
}

impl StreamBus {
    /// Builds the bus with capacities from per-stream configuration; each
    /// channel is sized for its consuming stream.
    pub fn new(config: &StreamsConfig) -> Self {
        let shed = OverflowPolicy::Shed {
            max_attempts: SHED_ATTEMPTS,
        };
        Self {
            ingestion: make("ingestion", config.scribe.queue_capacity, OverflowPolicy::Block),
            triage: make("triage", config.gatekeeper.queue_capacity, shed),
            analysis: make("analysis", config.thinker.queue_capacity, shed),
            enrichment: make(
                "enrichment",
                config.scribe.queue_capacity,
                OverflowPolicy::Shed { max_attempts: 3 },
            ),
            planning: make("planning", config.analyst.queue_capacity, shed),
            execution: make("execution", config.coordinator.queue_capacity, shed),
            response: make("response", config.responder.queue_capacity, shed),
        }
    }
}
