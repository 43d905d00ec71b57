// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream 4: the Coordinator.
//!
//! Executes one AnalystSnapshot as a state machine:
//! Initial (acquire the WORKING_ON lock) -> Running (DAG levels, independent
//! tasks concurrent, per-task soft deadline) -> MidCheck (newer user message
//! in the chat aborts the plan) -> Finalizing (execution snapshot +
//! ContextBundle) -> Terminal (lock cleared).
//!
//! A newer plan for the same chat cancels the in-flight one cooperatively;
//! ordering is decided by timestamps, never by arrival order.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use potik_bus::QueueSender;
use potik_core::types::{
    epoch_now, AnalystSnapshot, ContextBundle, PlanTask, TaskAction, TaskStatus, ToolOutput,
};
use potik_core::PotikError;
use potik_graph::GraphStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::researcher::Researcher;
use crate::validate::topo_levels;

/// Stream 4 worker: plan execution.
pub struct Coordinator {
    store: Arc<dyn GraphStore>,
    researcher: Arc<Researcher>,
    response: QueueSender<ContextBundle>,
    task_timeout: Duration,
    /// Chat id -> cancellation token of the in-flight plan.
    active: DashMap<i64, CancellationToken>,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn GraphStore>,
        researcher: Arc<Researcher>,
        response: QueueSender<ContextBundle>,
        task_timeout: Duration,
    ) -> Self {
        Self {
            store,
            researcher,
            response,
            task_timeout,
            active: DashMap::new(),
        }
    }

    /// Registers a new plan for the chat, cancelling any in-flight one.
    /// The newer intent supersedes.
    pub fn begin_plan(&self, chat_id: i64) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.active.insert(chat_id, token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Execute one plan end to end.
    pub async fn handle(&self, snapshot: AnalystSnapshot) {
        let token = self.begin_plan(snapshot.chat_id);

        // Initial: acquire the lock edge; replacement semantics live in the
        // store, so a superseded plan's edge is dropped here.
        if let Err(e) = self
            .store
            .set_working_on(&format!("{} {}", snapshot.intent, snapshot.msg_uid))
            .await
        {
            warn!(uid = %snapshot.msg_uid, error = %e, "failed to set WORKING_ON");
        }

        let started_at = epoch_now();
        let (outputs, cancelled) = self.run_plan(&snapshot, &token).await;

        if cancelled {
            // The superseding plan has already replaced the WORKING_ON edge;
            // deleting it here would clobber the newer plan's lock.
            info!(uid = %snapshot.msg_uid, "plan cancelled by a newer snapshot");
            return;
        }

        // MidCheck: a newer user message supersedes this plan even before
        // its snapshot arrives. Timestamps decide, not arrival order.
        match self
            .store
            .newer_message_in_chat(snapshot.chat_id, started_at)
            .await
        {
            Ok(true) => {
                info!(uid = %snapshot.msg_uid, "newer message in chat, aborting before finalize");
                self.terminal_cleanup(snapshot.chat_id, &token).await;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                // An unreachable store must not wedge the reply path.
                warn!(error = %e, "midcheck poll failed, continuing to finalize");
            }
        }

        // Finalizing: close the reasoning chain.
        let executed: Vec<String> = outputs
            .iter()
            .map(|o| format!("{}:{}", o.action, o.status))
            .collect();
        if let Some(plan_id) = &snapshot.snapshot_id
            && let Err(e) = self
                .store
                .save_execution_snapshot(plan_id, &executed.join(", "))
                .await
        {
            warn!(error = %e, "failed to save execution snapshot");
        }

        self.terminal_cleanup(snapshot.chat_id, &token).await;

        let uid = snapshot.msg_uid.clone();
        if let Err(e) = self.response.send(ContextBundle { snapshot, outputs }).await {
            warn!(uid = %uid, error = %e, "response channel unavailable");
        }
    }

    /// Terminal: clear the lock edge unless a newer plan owns it now.
    async fn terminal_cleanup(&self, chat_id: i64, token: &CancellationToken) {
        if token.is_cancelled() {
            return;
        }
        if let Err(e) = self.store.clear_working_on().await {
            warn!(error = %e, "failed to clear WORKING_ON");
        }
        self.active.remove_if(&chat_id, |_, t| !t.is_cancelled());
    }

    /// Running: execute DAG levels in order, tasks within a level
    /// concurrently. Returns the outputs and whether the plan was cancelled.
    async fn run_plan(
        &self,
        snapshot: &AnalystSnapshot,
        token: &CancellationToken,
    ) -> (Vec<ToolOutput>, bool) {
        let levels = match topo_levels(&snapshot.tasks) {
            Ok(levels) => levels,
            Err(e) => {
                // Plans are validated upstream; a cycle here is a logic bug.
                warn!(uid = %snapshot.msg_uid, error = %e, "unexecutable plan");
                return (Vec::new(), false);
            }
        };

        let mut outputs = Vec::with_capacity(snapshot.tasks.len());
        for level in levels {
            if token.is_cancelled() {
                return (outputs, true);
            }
            let level_outputs = futures::future::join_all(
                level
                    .iter()
                    .map(|task| self.execute_task(task, snapshot, token)),
            )
            .await;
            outputs.extend(level_outputs);
        }

        (outputs, token.is_cancelled())
    }

    /// One task under its soft deadline and the plan's cancellation token.
    /// A deadline breach empties the output but does not fail the plan.
    async fn execute_task(
        &self,
        task: &PlanTask,
        snapshot: &AnalystSnapshot,
        token: &CancellationToken,
    ) -> ToolOutput {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(task = task.id, "task skipped by cancellation");
                ToolOutput::empty(task.id, task.action, TaskStatus::Skipped)
            }
            result = tokio::time::timeout(self.task_timeout, self.run_action(task, snapshot)) => {
                match result {
                    Ok(output) => output,
                    Err(_) => {
                        potik_metrics::record_task_timeout(&task.action.to_string());
                        warn!(task = task.id, action = %task.action, "task breached soft deadline");
                        ToolOutput::empty(task.id, task.action, TaskStatus::TimedOut)
                    }
                }
            }
        }
    }

    async fn run_action(&self, task: &PlanTask, snapshot: &AnalystSnapshot) -> ToolOutput {
        match task.action {
            // Reply generation belongs to the Responder; the task only marks
            // the reply leaf of the DAG.
            TaskAction::Reply => ToolOutput::empty(task.id, task.action, TaskStatus::Done),

            TaskAction::SearchGraph => {
                let question = task
                    .args
                    .get("question")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&snapshot.trigger_text);
                match self.researcher.answer(question).await {
                    Ok(answer) => ToolOutput {
                        task_id: task.id,
                        action: task.action,
                        status: TaskStatus::Done,
                        output: answer,
                    },
                    Err(PotikError::Validation(reason)) => {
                        warn!(task = task.id, reason = reason.as_str(), "research query rejected");
                        ToolOutput::empty(task.id, task.action, TaskStatus::Rejected)
                    }
                    Err(e) => {
                        warn!(task = task.id, error = %e, "research failed");
                        ToolOutput::empty(task.id, task.action, TaskStatus::Failed)
                    }
                }
            }

            // The web-scraping service is an external boundary; without it
            // the task resolves to an empty skipped output.
            TaskAction::SearchWeb => {
                ToolOutput::empty(task.id, task.action, TaskStatus::Skipped)
            }

            TaskAction::FetchUserProfile => {
                let name = task
                    .args
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&snapshot.trigger_text);
                match self.store.user_profile(name).await {
                    Ok(profile) => ToolOutput {
                        task_id: task.id,
                        action: task.action,
                        status: TaskStatus::Done,
                        output: profile,
                    },
                    Err(e) => {
                        warn!(task = task.id, error = %e, "profile lookup failed");
                        ToolOutput::empty(task.id, task.action, TaskStatus::Failed)
                    }
                }
            }

            TaskAction::RememberFact => {
                let fact = task
                    .args
                    .get("fact")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .or_else(|| snapshot.narrative.clone())
                    .unwrap_or_else(|| snapshot.trigger_text.clone());
                match self.store.remember_fact(&fact).await {
                    Ok(()) => ToolOutput {
                        task_id: task.id,
                        action: task.action,
                        status: TaskStatus::Done,
                        output: "Факт збережено у графі.".to_string(),
                    },
                    Err(e) => {
                        warn!(task = task.id, error = %e, "remember_fact failed");
                        ToolOutput::empty(task.id, task.action, TaskStatus::Failed)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use potik_bus::{channel, OverflowPolicy};
    use potik_core::types::{
        GateDepth, GateTarget, GateVerdict, Intent, MessageUid, ToneHint,
    };
    use potik_prompt::PromptAssembler;
    use potik_switchboard::Switchboard;
    use potik_test_utils::{MemoryGraph, MockProvider};

    struct Fixture {
        coordinator: Coordinator,
        store: Arc<MemoryGraph>,
        provider: Arc<MockProvider>,
        response_rx: potik_bus::QueueReceiver<ContextBundle>,
    }

    fn fixture_with_timeout(timeout: Duration) -> Fixture {
        let store = Arc::new(MemoryGraph::new());
        let provider = Arc::new(MockProvider::named("mock"));
        let switchboard = Arc::new(Switchboard::new(
            vec![provider.clone()],
            Duration::from_secs(30),
        ));
        let assembler = Arc::new(PromptAssembler::new(store.clone(), Duration::from_secs(60)));
        let researcher = Arc::new(Researcher::new(
            store.clone(),
            switchboard,
            assembler,
        ));
        let (response_tx, response_rx) = channel("response", 8, OverflowPolicy::Block);

        Fixture {
            coordinator: Coordinator::new(store.clone(), researcher, response_tx, timeout),
            store,
            provider,
            response_rx,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_timeout(Duration::from_secs(5))
    }

    fn snapshot(tasks: Vec<PlanTask>) -> AnalystSnapshot {
        AnalystSnapshot {
            msg_uid: MessageUid::new(1, 100),
            chat_id: 1,
            intent: Intent::Question,
            tasks,
            narrative: Some("Макс питає про docker.".into()),
            snapshot_id: None,
            trigger_text: "що я казав про docker?".into(),
            gate: GateVerdict {
                target: GateTarget::Direct,
                required_depth: GateDepth::DeepAnalysis,
                tone_hint: ToneHint::Neutral,
            },
            created_at: epoch_now(),
        }
    }

    fn search_and_reply() -> Vec<PlanTask> {
        let mut search = PlanTask::new(1, TaskAction::SearchGraph);
        search.args = serde_json::json!({"question": "docker"});
        let mut reply = PlanTask::new(2, TaskAction::Reply);
        reply.depends_on = vec![1];
        vec![search, reply]
    }

    #[tokio::test]
    async fn executes_plan_and_emits_bundle() {
        let f = fixture();
        f.provider.push_response(
            "MATCH (m:Message) WHERE m.text CONTAINS 'docker' RETURN m.text LIMIT 10",
        );
        f.provider.push_response("Макс учора згадував docker compose.");
        f.store
            .script_readonly_result(vec![serde_json::json!({"m.text": "docker compose"})]);

        f.coordinator.handle(snapshot(search_and_reply())).await;

        let bundle = f.response_rx.recv().await.unwrap();
        assert_eq!(bundle.outputs.len(), 2);
        let search = &bundle.outputs[0];
        assert_eq!(search.status, TaskStatus::Done);
        assert!(search.output.contains("docker"));
        // WORKING_ON cleared at Terminal.
        assert!(f.store.working_on().is_none());
    }

    #[tokio::test]
    async fn rejected_research_query_marks_task_rejected() {
        let f = fixture();
        f.provider
            .push_response("MATCH (n) DELETE n RETURN 1 LIMIT 1");

        f.coordinator.handle(snapshot(search_and_reply())).await;

        let bundle = f.response_rx.recv().await.unwrap();
        assert_eq!(bundle.outputs[0].status, TaskStatus::Rejected);
        assert!(bundle.outputs[0].output.is_empty());
        // Plan still completes and reaches the Responder.
        assert_eq!(bundle.outputs[1].status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn timeout_empties_task_but_plan_continues() {
        let f = fixture_with_timeout(Duration::from_millis(20));
        // The researcher's LLM call stalls past the soft deadline.
        f.provider.set_delay(Duration::from_millis(200));

        f.coordinator.handle(snapshot(search_and_reply())).await;

        let bundle = f.response_rx.recv().await.unwrap();
        assert_eq!(bundle.outputs[0].status, TaskStatus::TimedOut);
        assert!(bundle.outputs[0].output.is_empty());
        // The reply leaf still completed; the plan did not fail.
        assert_eq!(bundle.outputs[1].status, TaskStatus::Done);
        assert!(f.store.working_on().is_none());
    }

    #[tokio::test]
    async fn newer_plan_cancels_previous_token() {
        let f = fixture();
        let first = f.coordinator.begin_plan(1);
        let second = f.coordinator.begin_plan(1);
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        // Plans for other chats are unaffected.
        let other = f.coordinator.begin_plan(2);
        assert!(!other.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[tokio::test]
    async fn midcheck_aborts_when_newer_user_message_exists() {
        let f = fixture();
        // A user message timestamped in the future relative to plan start.
        f.store
            .persist_event(&potik_core::types::IngestEvent {
                chat_id: 1,
                message_id: 200,
                source: potik_core::types::EventSource::User,
                sender_id: 42,
                sender_name: Some("Maks".into()),
                chat_kind: potik_core::types::ChatKind::Group,
                text: "а, забудь, інше питання".into(),
                timestamp: epoch_now() + 120.0,
                media: None,
            })
            .await
            .unwrap();

        let mut reply = PlanTask::new(1, TaskAction::Reply);
        reply.args = serde_json::Value::Null;
        f.coordinator.handle(snapshot(vec![reply])).await;

        // Aborted before finalize: no bundle, lock cleared.
        assert!(f.response_rx.try_recv().await.is_none());
        assert!(f.store.working_on().is_none());
    }

    #[tokio::test]
    async fn search_web_resolves_to_skipped_empty_output() {
        let f = fixture();
        let mut web = PlanTask::new(1, TaskAction::SearchWeb);
        web.args = serde_json::json!({"query": "docker"});
        let mut reply = PlanTask::new(2, TaskAction::Reply);
        reply.depends_on = vec![1];

        f.coordinator.handle(snapshot(vec![web, reply])).await;

        let bundle = f.response_rx.recv().await.unwrap();
        assert_eq!(bundle.outputs[0].status, TaskStatus::Skipped);
        assert!(bundle.outputs[0].output.is_empty());
    }

    #[tokio::test]
    async fn remember_fact_writes_entity() {
        let f = fixture();
        let mut remember = PlanTask::new(1, TaskAction::RememberFact);
        remember.args = serde_json::json!({"fact": "Макс любить каву"});
        let reply = PlanTask::new(2, TaskAction::Reply);

        f.coordinator.handle(snapshot(vec![remember, reply])).await;

        let bundle = f.response_rx.recv().await.unwrap();
        assert_eq!(bundle.outputs[0].status, TaskStatus::Done);
        assert!(f.store.entity_type("Макс любить каву").is_some());
    }
}
