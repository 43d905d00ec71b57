// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream 2a: the Gatekeeper.
//!
//! Cheap triage that shields the expensive streams: classifies addressee,
//! required depth, and tone using the configured local model. Hard rules
//! run before the LLM: media events force DIRECT/QUICK_REPLY, and naming
//! the agent forces DIRECT. A SKIP verdict terminates the pipeline for the
//! message (it stays persisted).

use std::sync::Arc;

use potik_bus::QueueSender;
use potik_core::traits::{LlmRequest, ResponseSchema};
use potik_core::types::{AnalysisJob, GateDepth, GateTarget, GateVerdict, IngestEvent, PlanningJob, TriageJob};
use potik_graph::GraphStore;
use potik_prompt::PromptAssembler;
use potik_switchboard::Switchboard;
use tracing::{debug, info, warn};

use crate::validate::parse_verdict;

/// Recent messages shown to the classifier for addressee resolution.
const TRIAGE_CONTEXT: usize = 5;

/// Stream 2a worker: triage.
pub struct Gatekeeper {
    store: Arc<dyn GraphStore>,
    switchboard: Arc<Switchboard>,
    assembler: Arc<PromptAssembler>,
    analysis: QueueSender<AnalysisJob>,
    planning: QueueSender<PlanningJob>,
    model: String,
    agent_name: String,
}

impl Gatekeeper {
    pub fn new(
        store: Arc<dyn GraphStore>,
        switchboard: Arc<Switchboard>,
        assembler: Arc<PromptAssembler>,
        analysis: QueueSender<AnalysisJob>,
        planning: QueueSender<PlanningJob>,
        model: String,
        agent_name: String,
    ) -> Self {
        Self {
            store,
            switchboard,
            assembler,
            analysis,
            planning,
            model,
            agent_name,
        }
    }

    /// Triage one persisted message and route it (or drop it).
    pub async fn handle(&self, job: TriageJob) {
        let verdict = self.classify(&job.event).await;
        potik_metrics::record_gate_verdict(&verdict.target.to_string());
        info!(uid = %job.uid, target = %verdict.target, depth = %verdict.required_depth,
              "gatekeeper verdict");

        if verdict.is_skip() {
            debug!(uid = %job.uid, "pipeline terminated by gatekeeper");
            return;
        }

        let result = match verdict.required_depth {
            GateDepth::QuickReply => {
                self.planning
                    .send(PlanningJob {
                        uid: job.uid,
                        event: job.event,
                        gate: verdict,
                        narrative: None,
                        narrative_id: None,
                    })
                    .await
            }
            GateDepth::DeepAnalysis => {
                self.analysis
                    .send(AnalysisJob {
                        uid: job.uid,
                        event: job.event,
                        gate: verdict,
                    })
                    .await
            }
            GateDepth::Skip => unreachable!("skip handled above"),
        };

        if let Err(e) = result {
            warn!(error = %e, "failed to route gatekeeper verdict downstream");
        }
    }

    /// Full verdict: hard rules first, then the LLM classifier.
    async fn classify(&self, event: &IngestEvent) -> GateVerdict {
        // Hardware/media triggers bypass the classifier entirely.
        if event.media.is_some() {
            return GateVerdict::media_direct();
        }

        let mut verdict = self.llm_classify(event).await;

        // Naming the agent always means DIRECT, whatever the model said.
        if mentions_agent(&event.text, &self.agent_name) {
            verdict.target = GateTarget::Direct;
            if verdict.required_depth == GateDepth::Skip {
                verdict.required_depth = GateDepth::QuickReply;
            }
        }

        verdict
    }

    /// LLM classification with one stricter retry; degraded to SKIP when
    /// both attempts produce unusable output.
    async fn llm_classify(&self, event: &IngestEvent) -> GateVerdict {
        let system = match self.assembler.assemble("Gatekeeper", Some("Triage")).await {
            Ok(system) => system,
            Err(e) => {
                warn!(error = %e, "gatekeeper prompt unavailable, skipping message");
                return GateVerdict::skip();
            }
        };

        let context = self
            .store
            .chat_context(event.chat_id, TRIAGE_CONTEXT)
            .await
            .unwrap_or_default();
        let history: String = context
            .iter()
            .map(|line| format!("[{}] {}: {}\n", line.time, line.author, line.text))
            .collect();

        let author = event.sender_name.as_deref().unwrap_or("невідомий");
        let user_prompt = format!(
            "Останні повідомлення чату:\n{history}\nНове повідомлення:\n[{author}]: {text}",
            text = event.text
        );

        for attempt in 0..2 {
            let mut request = LlmRequest::prompt(Some(system.clone()), user_prompt.clone());
            request.model = Some(self.model.clone());
            request.response_schema = Some(ResponseSchema::object_with_keys(&[
                "target",
                "required_depth",
                "tone_hint",
            ]));
            if attempt > 0 {
                request.messages[0].content.push_str(
                    "\n\nНАГАДУВАННЯ: поверни ТІЛЬКИ валідний JSON-об'єкт вердикту, без жодного іншого тексту.",
                );
            }

            match self.switchboard.call(&request).await {
                Ok(reply) => match parse_verdict(&reply.content) {
                    Ok(verdict) => return verdict,
                    Err(e) => {
                        warn!(attempt, error = %e, "gatekeeper returned malformed verdict");
                    }
                },
                Err(e) => {
                    warn!(attempt, error = %e, "gatekeeper classification call failed");
                }
            }
        }

        GateVerdict::skip()
    }
}

/// Case-insensitive check whether the text names the agent.
fn mentions_agent(text: &str, agent_name: &str) -> bool {
    !agent_name.trim().is_empty()
        && text.to_lowercase().contains(&agent_name.trim().to_lowercase())
}
