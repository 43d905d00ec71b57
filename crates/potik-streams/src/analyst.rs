// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream 3: the Analyst.
//!
//! Turns a triaged (and possibly enriched) message into an executable plan:
//! an intent classification plus a task DAG from the closed action set. An
//! invalid plan gets one stricter retry, then the apology fallback. A NOISE
//! intent ends the pipeline here; the message stays persisted.

use std::sync::Arc;

use potik_bus::QueueSender;
use potik_core::traits::{LlmRequest, ResponseSchema};
use potik_core::types::{epoch_now, AnalystSnapshot, Intent, PlanningJob};
use potik_graph::GraphStore;
use potik_prompt::PromptAssembler;
use potik_switchboard::Switchboard;
use tracing::{info, warn};

use crate::validate::{parse_plan, validate_plan};

/// Stream 3 worker: intent classification and plan formulation.
pub struct Analyst {
    store: Arc<dyn GraphStore>,
    switchboard: Arc<Switchboard>,
    assembler: Arc<PromptAssembler>,
    execution: QueueSender<AnalystSnapshot>,
}

impl Analyst {
    pub fn new(
        store: Arc<dyn GraphStore>,
        switchboard: Arc<Switchboard>,
        assembler: Arc<PromptAssembler>,
        execution: QueueSender<AnalystSnapshot>,
    ) -> Self {
        Self {
            store,
            switchboard,
            assembler,
            execution,
        }
    }

    /// Formulate and forward a plan for one planning job.
    pub async fn handle(&self, job: PlanningJob) {
        let mut snapshot = self.plan(&job).await;

        if snapshot.intent == Intent::Noise {
            info!(uid = %job.uid, "analyst classified message as noise, stopping");
            return;
        }

        match self
            .store
            .save_plan_snapshot(job.narrative_id.as_deref(), &snapshot)
            .await
        {
            Ok(id) => snapshot.snapshot_id = Some(id),
            Err(e) => warn!(uid = %job.uid, error = %e, "failed to save plan snapshot"),
        }

        info!(uid = %job.uid, intent = %snapshot.intent, tasks = snapshot.tasks.len(),
              "plan forwarded to coordinator");
        if let Err(e) = self.execution.send(snapshot).await {
            warn!(uid = %job.uid, error = %e, "execution channel unavailable");
        }
    }

    /// Plan formulation with one stricter retry, then the apology fallback.
    async fn plan(&self, job: &PlanningJob) -> AnalystSnapshot {
        let system = match self
            .assembler
            .assemble("Analyst", Some("PlanFormulation"))
            .await
        {
            Ok(system) => system,
            Err(e) => {
                warn!(error = %e, "analyst prompt unavailable, using fallback plan");
                return self.fallback(job);
            }
        };

        let narrative = job.narrative.as_deref().unwrap_or("(без наративу)");
        let author = job.event.sender_name.as_deref().unwrap_or("невідомий");
        let user_prompt = format!(
            "Наратив: {narrative}\nОригінальне повідомлення:\n[{author}]: {text}\n\n\
             Адресат за вердиктом вартового: {target}, глибина: {depth}.",
            text = job.event.text,
            target = job.gate.target,
            depth = job.gate.required_depth,
        );

        for attempt in 0..2 {
            let mut request = LlmRequest::prompt(Some(system.clone()), user_prompt.clone());
            request.response_schema = Some(ResponseSchema::object_with_keys(&["intent", "tasks"]));
            if attempt > 0 {
                request.messages[0].content.push_str(
                    "\n\nНАГАДУВАННЯ: поверни ТІЛЬКИ валідний JSON з полями intent і tasks; \
                     дії лише з набору reply, search_graph, search_web, fetch_user_profile, \
                     remember_fact; останньою задачею має бути reply.",
                );
            }

            match self.switchboard.call(&request).await {
                Ok(reply) => match parse_plan(&reply.content) {
                    Ok(parsed) => {
                        if parsed.intent == Intent::Noise {
                            return AnalystSnapshot {
                                msg_uid: job.uid.clone(),
                                chat_id: job.event.chat_id,
                                intent: Intent::Noise,
                                tasks: Vec::new(),
                                narrative: job.narrative.clone(),
                                snapshot_id: None,
                                trigger_text: job.event.text.clone(),
                                gate: job.gate,
                                created_at: epoch_now(),
                            };
                        }
                        match validate_plan(&parsed.tasks) {
                            Ok(()) => {
                                return AnalystSnapshot {
                                    msg_uid: job.uid.clone(),
                                    chat_id: job.event.chat_id,
                                    intent: parsed.intent,
                                    tasks: parsed.tasks,
                                    narrative: job.narrative.clone(),
                                    snapshot_id: None,
                                    trigger_text: job.event.text.clone(),
                                    gate: job.gate,
                                    created_at: epoch_now(),
                                };
                            }
                            Err(e) => {
                                warn!(uid = %job.uid, attempt, error = %e, "invalid plan");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(uid = %job.uid, attempt, error = %e, "malformed plan output");
                    }
                },
                Err(e) => {
                    warn!(uid = %job.uid, attempt, error = %e, "analyst call failed");
                }
            }
        }

        self.fallback(job)
    }

    fn fallback(&self, job: &PlanningJob) -> AnalystSnapshot {
        potik_metrics::record_plan_fallback();
        let mut snapshot = AnalystSnapshot::fallback(
            job.uid.clone(),
            job.event.chat_id,
            job.event.text.clone(),
            job.gate,
        );
        snapshot.narrative = job.narrative.clone();
        snapshot
    }
}
