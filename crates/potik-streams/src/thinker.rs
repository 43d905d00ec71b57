// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream 2b: the Thinker.
//!
//! Semantic enrichment of one message in the context of recent history,
//! active topics, and the known entity kinds. Produces the enrichment
//! payload for the Scribe and the planning payload (with narrative) for the
//! Analyst. Raw prompt/response pairs go to the ThoughtLog graph through a
//! bounded fire-and-forget writer.

use std::sync::Arc;

use potik_bus::QueueSender;
use potik_core::traits::{LlmRequest, ResponseSchema};
use potik_core::types::{AnalysisJob, Enrichment, PlanningJob};
use potik_graph::GraphStore;
use potik_prompt::PromptAssembler;
use potik_switchboard::Switchboard;
use tracing::{debug, info, warn};

use crate::thought_log::ThoughtLogWriter;
use crate::validate::parse_thinker_output;

/// Recent thought-log entries included so the model does not repeat itself.
const RECENT_THOUGHTS: usize = 5;

/// Stream 2b worker: semantic analysis.
pub struct Thinker {
    store: Arc<dyn GraphStore>,
    switchboard: Arc<Switchboard>,
    assembler: Arc<PromptAssembler>,
    thought_log: ThoughtLogWriter,
    enrichment: QueueSender<Enrichment>,
    planning: QueueSender<PlanningJob>,
    history_k: usize,
}

impl Thinker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn GraphStore>,
        switchboard: Arc<Switchboard>,
        assembler: Arc<PromptAssembler>,
        thought_log: ThoughtLogWriter,
        enrichment: QueueSender<Enrichment>,
        planning: QueueSender<PlanningJob>,
        history_k: usize,
    ) -> Self {
        Self {
            store,
            switchboard,
            assembler,
            thought_log,
            enrichment,
            planning,
            history_k,
        }
    }

    /// Enrich one message and fan out to the Scribe and the Analyst.
    pub async fn handle(&self, job: AnalysisJob) {
        let (enrichment, model) = self.analyze(&job).await;

        let narrative = (!enrichment.narrative.trim().is_empty())
            .then(|| enrichment.narrative.clone());

        // Persist the narrative snapshot before fan-out so the Analyst can
        // chain its plan snapshot to it.
        let narrative_id = match &narrative {
            Some(narrative) => match self
                .store
                .save_thought_snapshot(&job.uid, narrative, &model)
                .await
            {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(uid = %job.uid, error = %e, "failed to save thought snapshot");
                    None
                }
            },
            None => None,
        };

        // Enrichment is best effort; the channel may shed under pressure.
        if let Err(e) = self.enrichment.send(enrichment).await {
            warn!(uid = %job.uid, error = %e, "enrichment channel unavailable");
        }

        let planning_job = PlanningJob {
            uid: job.uid.clone(),
            event: job.event,
            gate: job.gate,
            narrative,
            narrative_id,
        };
        if let Err(e) = self.planning.send(planning_job).await {
            warn!(uid = %job.uid, error = %e, "planning channel unavailable");
        }
    }

    /// Semantic analysis with one stricter retry; degrades to the empty
    /// enrichment so the plan still executes. Returns the enrichment and
    /// the model that produced it.
    async fn analyze(&self, job: &AnalysisJob) -> (Enrichment, String) {
        let system = match self
            .assembler
            .assemble("Thinker", Some("SemanticAnalysis"))
            .await
        {
            Ok(system) => system,
            Err(e) => {
                warn!(error = %e, "thinker prompt unavailable");
                return (Enrichment::empty(job.uid.clone()), String::new());
            }
        };

        let user_prompt = self.build_context_prompt(job).await;

        for attempt in 0..2 {
            let mut request = LlmRequest::prompt(Some(system.clone()), user_prompt.clone());
            request.response_schema = Some(ResponseSchema::object_with_keys(&["narrative"]));
            if attempt > 0 {
                request.messages[0].content.push_str(
                    "\n\nНАГАДУВАННЯ: поверни ТІЛЬКИ валідний JSON з полями topics, entities, narrative.",
                );
            }

            match self.switchboard.call(&request).await {
                Ok(reply) => {
                    self.thought_log
                        .record(&user_prompt, &reply.content, &reply.model);

                    match parse_thinker_output(&reply.content) {
                        Ok(output) => {
                            info!(uid = %job.uid, topics = output.topics.len(),
                                  entities = output.entities.len(), "semantic analysis complete");
                            return (
                                Enrichment {
                                    msg_uid: job.uid.clone(),
                                    topics: output.topics,
                                    entities: output.entities,
                                    narrative: output.narrative,
                                },
                                reply.model,
                            );
                        }
                        Err(e) => {
                            warn!(uid = %job.uid, attempt, error = %e,
                                  "thinker output failed validation");
                        }
                    }
                }
                Err(e) => {
                    warn!(uid = %job.uid, attempt, error = %e, "thinker call failed");
                }
            }
        }

        debug!(uid = %job.uid, "emitting empty enrichment after failed analysis");
        (Enrichment::empty(job.uid.clone()), String::new())
    }

    /// Assemble the runtime context block below the system prompt.
    async fn build_context_prompt(&self, job: &AnalysisJob) -> String {
        let context = self
            .store
            .chat_context(job.event.chat_id, self.history_k)
            .await
            .unwrap_or_default();
        let topics = self.store.active_topics().await.unwrap_or_default();
        let entity_kinds = self.store.entity_kinds().await.unwrap_or_default();
        let recent_thoughts = self
            .store
            .recent_thoughts(RECENT_THOUGHTS)
            .await
            .unwrap_or_default();

        let history: String = context
            .iter()
            .map(|line| format!("[{}] {}: {}\n", line.time, line.author, line.text))
            .collect();
        let topics_block = if topics.is_empty() {
            "Немає".to_string()
        } else {
            topics
                .iter()
                .map(|t| format!("- {}: {}\n", t.title, t.description))
                .collect()
        };
        let kinds_block = if entity_kinds.is_empty() {
            "Немає".to_string()
        } else {
            entity_kinds.join(", ")
        };
        let thoughts_block = if recent_thoughts.is_empty() {
            "Немає".to_string()
        } else {
            recent_thoughts
                .iter()
                .map(|t| {
                    let short: String = t.chars().take(100).collect();
                    format!("- {short}\n")
                })
                .collect()
        };

        let author = job.event.sender_name.as_deref().unwrap_or("невідомий");
        format!(
            "КОНТЕКСТ:\n---\nВідомі типи сутностей: {kinds_block}\n---\nАктивні теми:\n{topics_block}\
             ---\nНедавні думки (не повторюй їх):\n{thoughts_block}\
             ---\nІсторія чату (останні {k} повідомлень):\n{history}---\n\n\
             НОВЕ ПОВІДОМЛЕННЯ:\n[{author}]: {text}",
            k = self.history_k,
            text = job.event.text,
        )
    }
}
