// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `GraphStore` implementation.
//!
//! Models just enough of the temporal multi-graph (messages, chronology
//! edges, topics/entities, snapshots, thought log, prompt subgraph) for the
//! whole pipeline to run and be inspected in tests without a server.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use potik_core::types::{AnalystSnapshot, Enrichment, EventSource, IngestEvent, MessageUid};
use potik_core::PotikError;
use potik_graph::normalize_title;
use potik_graph::store::{
    ContextLine, GraphStore, PromptAtom, PromptSeed, StoredMessage, TopicInfo,
};

/// A message row in the in-memory graph.
#[derive(Debug, Clone)]
pub struct MemoryMessage {
    pub uid: MessageUid,
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    pub created_at: f64,
    pub author_name: String,
    pub source: EventSource,
}

#[derive(Debug, Clone)]
struct TopicState {
    description: String,
    status: String,
}

#[derive(Debug, Clone)]
struct PromptInstructionRow {
    role: String,
    task: String,
    name: String,
    content: String,
    order: u32,
}

#[derive(Default)]
struct State {
    messages: Vec<MemoryMessage>,
    last_event: HashMap<i64, MessageUid>,
    next_edges: Vec<(MessageUid, MessageUid)>,
    users: HashMap<i64, String>,

    topics: HashMap<String, TopicState>,
    entities: HashMap<String, String>,
    discusses: HashSet<(String, String)>,
    mentions: HashSet<(String, String)>,
    involves: HashSet<(String, String)>,

    thought_snapshots: Vec<(String, MessageUid, String)>,
    plan_snapshots: Vec<(String, String)>,
    execution_snapshots: Vec<(String, String)>,
    log_entries: Vec<(String, String, String)>,
    system_events: Vec<(String, String, String, String)>,
    working_on: Option<String>,

    roles: HashMap<String, String>,
    role_tasks: Vec<(String, String, String)>,
    instructions: Vec<PromptInstructionRow>,
    instruction_rules: HashMap<String, Vec<(String, String)>>,

    readonly_queries: Vec<String>,
    readonly_results: VecDeque<Vec<serde_json::Value>>,
    failing_persists: u32,
    snapshot_seq: u64,
}

/// In-memory graph store, shareable across the pipeline via `Arc`.
#[derive(Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Inspection helpers for tests ---

    pub fn messages(&self) -> Vec<MemoryMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn message(&self, uid: &MessageUid) -> Option<MemoryMessage> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| &m.uid == uid)
            .cloned()
    }

    pub fn last_event(&self, chat_id: i64) -> Option<MessageUid> {
        self.state.lock().unwrap().last_event.get(&chat_id).cloned()
    }

    pub fn next_edges(&self) -> Vec<(MessageUid, MessageUid)> {
        self.state.lock().unwrap().next_edges.clone()
    }

    pub fn topic(&self, title: &str) -> Option<(String, String)> {
        self.state
            .lock()
            .unwrap()
            .topics
            .get(&normalize_title(title))
            .map(|t| (t.description.clone(), t.status.clone()))
    }

    pub fn topic_count(&self) -> usize {
        self.state.lock().unwrap().topics.len()
    }

    pub fn discusses_count(&self, uid: &MessageUid, title: &str) -> usize {
        let state = self.state.lock().unwrap();
        usize::from(
            state
                .discusses
                .contains(&(uid.0.clone(), normalize_title(title))),
        )
    }

    pub fn entity_type(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .entities
            .get(&normalize_title(name))
            .cloned()
    }

    pub fn thought_snapshots(&self) -> Vec<(String, MessageUid, String)> {
        self.state.lock().unwrap().thought_snapshots.clone()
    }

    pub fn log_entries(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().log_entries.clone()
    }

    pub fn system_events(&self) -> Vec<(String, String, String, String)> {
        self.state.lock().unwrap().system_events.clone()
    }

    pub fn working_on(&self) -> Option<String> {
        self.state.lock().unwrap().working_on.clone()
    }

    pub fn readonly_queries(&self) -> Vec<String> {
        self.state.lock().unwrap().readonly_queries.clone()
    }

    // --- Scripting helpers for tests ---

    /// Queue a result set for the next `run_readonly` call.
    pub fn script_readonly_result(&self, rows: Vec<serde_json::Value>) {
        self.state.lock().unwrap().readonly_results.push_back(rows);
    }

    /// Make the next `n` persist calls fail with a graph error.
    pub fn fail_next_persists(&self, n: u32) {
        self.state.lock().unwrap().failing_persists = n;
    }

    /// Overwrite a role description, bypassing MERGE semantics (used to test
    /// prompt-cache invalidation).
    pub fn set_role_description(&self, role: &str, description: &str) {
        self.state
            .lock()
            .unwrap()
            .roles
            .insert(role.to_string(), description.to_string());
    }

    fn next_snapshot_id(state: &mut State, prefix: &str) -> String {
        state.snapshot_seq += 1;
        format!("{prefix}_{:04}", state.snapshot_seq)
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn ping(&self) -> Result<(), PotikError> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), PotikError> {
        Ok(())
    }

    async fn persist_event(&self, event: &IngestEvent) -> Result<MessageUid, PotikError> {
        let mut state = self.state.lock().unwrap();

        if state.failing_persists > 0 {
            state.failing_persists -= 1;
            return Err(PotikError::graph("scripted persist failure"));
        }

        let uid = event.uid();
        if state.messages.iter().any(|m| m.uid == uid) {
            return Ok(uid);
        }

        let author_name = match event.source {
            EventSource::Agent => "agent".to_string(),
            EventSource::User => event
                .sender_name
                .clone()
                .unwrap_or_else(|| format!("user_{}", event.sender_id)),
        };
        state.users.insert(event.sender_id, author_name.clone());

        state.messages.push(MemoryMessage {
            uid: uid.clone(),
            chat_id: event.chat_id,
            message_id: event.message_id,
            text: event.text.clone(),
            created_at: event.timestamp,
            author_name,
            source: event.source,
        });

        if let Some(prev) = state.last_event.insert(event.chat_id, uid.clone()) {
            state.next_edges.push((prev, uid.clone()));
        }

        Ok(uid)
    }

    async fn apply_enrichment(&self, enrichment: &Enrichment) -> Result<(), PotikError> {
        let mut state = self.state.lock().unwrap();
        let uid = enrichment.msg_uid.0.clone();

        for topic in &enrichment.topics {
            let title = normalize_title(&topic.title);
            state.topics.entry(title.clone()).or_insert(TopicState {
                description: topic.title.trim().to_string(),
                status: "active".to_string(),
            });
            state.discusses.insert((uid.clone(), title));
        }

        for entity in &enrichment.entities {
            let name = normalize_title(&entity.name);
            state
                .entities
                .entry(name.clone())
                .or_insert_with(|| entity.kind.to_string());
            state.mentions.insert((uid.clone(), name.clone()));
            for topic in &enrichment.topics {
                state
                    .involves
                    .insert((normalize_title(&topic.title), name.clone()));
            }
        }

        Ok(())
    }

    async fn chat_context(
        &self,
        chat_id: i64,
        limit: usize,
    ) -> Result<Vec<ContextLine>, PotikError> {
        let state = self.state.lock().unwrap();
        let mut messages: Vec<&MemoryMessage> = state
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .collect();
        messages.sort_by(|a, b| a.created_at.total_cmp(&b.created_at));

        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..]
            .iter()
            .map(|m| ContextLine {
                author: m.author_name.clone(),
                text: m.text.clone(),
                time: DateTime::<Utc>::from_timestamp(m.created_at as i64, 0)
                    .unwrap_or_else(Utc::now)
                    .format("%H:%M:%S")
                    .to_string(),
                created_at: m.created_at,
            })
            .collect())
    }

    async fn active_topics(&self) -> Result<Vec<TopicInfo>, PotikError> {
        let state = self.state.lock().unwrap();
        let mut topics: Vec<TopicInfo> = state
            .topics
            .iter()
            .filter(|(_, t)| t.status == "active")
            .map(|(title, t)| TopicInfo {
                title: title.clone(),
                description: t.description.clone(),
            })
            .collect();
        topics.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(topics)
    }

    async fn entity_kinds(&self) -> Result<Vec<String>, PotikError> {
        let state = self.state.lock().unwrap();
        let mut kinds: Vec<String> = state
            .entities
            .values()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        kinds.sort();
        Ok(kinds)
    }

    async fn message_exists(&self, uid: &MessageUid) -> Result<bool, PotikError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .messages
            .iter()
            .any(|m| &m.uid == uid))
    }

    async fn recent_messages(&self, limit: usize) -> Result<Vec<StoredMessage>, PotikError> {
        let state = self.state.lock().unwrap();
        let mut messages: Vec<&MemoryMessage> = state.messages.iter().collect();
        messages.sort_by(|a, b| b.created_at.total_cmp(&a.created_at));
        Ok(messages
            .into_iter()
            .take(limit)
            .map(|m| StoredMessage {
                uid: m.uid.clone(),
                chat_id: m.chat_id,
                message_id: m.message_id,
                text: m.text.clone(),
                created_at: m.created_at,
            })
            .collect())
    }

    async fn save_thought_snapshot(
        &self,
        uid: &MessageUid,
        narrative: &str,
        _model: &str,
    ) -> Result<String, PotikError> {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_snapshot_id(&mut state, "snap_narrative");
        state
            .thought_snapshots
            .push((id.clone(), uid.clone(), narrative.to_string()));
        Ok(id)
    }

    async fn save_plan_snapshot(
        &self,
        narrative_id: Option<&str>,
        snapshot: &AnalystSnapshot,
    ) -> Result<String, PotikError> {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_snapshot_id(&mut state, "snap_plan");
        state.plan_snapshots.push((
            id.clone(),
            format!(
                "from={} intent={}",
                narrative_id.unwrap_or("-"),
                snapshot.intent
            ),
        ));
        Ok(id)
    }

    async fn save_execution_snapshot(
        &self,
        plan_id: &str,
        summary: &str,
    ) -> Result<String, PotikError> {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_snapshot_id(&mut state, "snap_exec");
        state
            .execution_snapshots
            .push((id.clone(), format!("from={plan_id} {summary}")));
        Ok(id)
    }

    async fn log_thought(
        &self,
        prompt: &str,
        response: &str,
        model: &str,
    ) -> Result<(), PotikError> {
        self.state.lock().unwrap().log_entries.push((
            prompt.to_string(),
            response.to_string(),
            model.to_string(),
        ));
        Ok(())
    }

    async fn recent_thoughts(&self, limit: usize) -> Result<Vec<String>, PotikError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .log_entries
            .iter()
            .rev()
            .take(limit)
            .map(|(_, response, _)| response.clone())
            .collect())
    }

    async fn log_system_event(
        &self,
        kind: &str,
        source: &str,
        severity: &str,
        details: &str,
    ) -> Result<(), PotikError> {
        self.state.lock().unwrap().system_events.push((
            kind.to_string(),
            source.to_string(),
            severity.to_string(),
            details.to_string(),
        ));
        Ok(())
    }

    async fn set_working_on(&self, task_label: &str) -> Result<(), PotikError> {
        self.state.lock().unwrap().working_on = Some(task_label.to_string());
        Ok(())
    }

    async fn clear_working_on(&self) -> Result<(), PotikError> {
        self.state.lock().unwrap().working_on = None;
        Ok(())
    }

    async fn newer_message_in_chat(
        &self,
        chat_id: i64,
        since_epoch: f64,
    ) -> Result<bool, PotikError> {
        let state = self.state.lock().unwrap();
        Ok(state.messages.iter().any(|m| {
            m.chat_id == chat_id && m.source == EventSource::User && m.created_at >= since_epoch
        }))
    }

    async fn user_profile(&self, name: &str) -> Result<String, PotikError> {
        let state = self.state.lock().unwrap();
        let needle = name.trim().to_lowercase();
        match state
            .users
            .iter()
            .find(|(_, user_name)| user_name.to_lowercase().contains(&needle))
        {
            Some((telegram_id, user_name)) => {
                let count = state
                    .messages
                    .iter()
                    .filter(|m| m.author_name == *user_name)
                    .count();
                Ok(format!(
                    "{user_name} (telegram_id {telegram_id}), {count} повідомлень у графі"
                ))
            }
            None => Ok(format!("Користувача '{name}' не знайдено у графі")),
        }
    }

    async fn remember_fact(&self, fact: &str) -> Result<(), PotikError> {
        let name: String = normalize_title(fact).chars().take(80).collect();
        self.state
            .lock()
            .unwrap()
            .entities
            .entry(name)
            .or_insert_with(|| "Concept".to_string());
        Ok(())
    }

    async fn run_readonly(&self, cypher: &str) -> Result<Vec<serde_json::Value>, PotikError> {
        let mut state = self.state.lock().unwrap();
        state.readonly_queries.push(cypher.to_string());
        Ok(state.readonly_results.pop_front().unwrap_or_default())
    }

    async fn prompt_role(&self, role: &str) -> Result<Option<PromptAtom>, PotikError> {
        let state = self.state.lock().unwrap();
        Ok(state.roles.get(role).map(|description| PromptAtom {
            name: role.to_string(),
            content: description.clone(),
        }))
    }

    async fn prompt_tasks(&self, role: &str) -> Result<Vec<PromptAtom>, PotikError> {
        let state = self.state.lock().unwrap();
        let mut tasks: Vec<PromptAtom> = state
            .role_tasks
            .iter()
            .filter(|(r, _, _)| r == role)
            .map(|(_, name, description)| PromptAtom {
                name: name.clone(),
                content: description.clone(),
            })
            .collect();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tasks)
    }

    async fn prompt_instructions(
        &self,
        role: &str,
        task: &str,
    ) -> Result<Vec<PromptAtom>, PotikError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<&PromptInstructionRow> = state
            .instructions
            .iter()
            .filter(|row| row.role == role && row.task == task)
            .collect();
        rows.sort_by_key(|row| row.order);
        Ok(rows
            .into_iter()
            .map(|row| PromptAtom {
                name: row.name.clone(),
                content: row.content.clone(),
            })
            .collect())
    }

    async fn prompt_rules(&self, instruction: &str) -> Result<Vec<PromptAtom>, PotikError> {
        let state = self.state.lock().unwrap();
        let mut rules: Vec<PromptAtom> = state
            .instruction_rules
            .get(instruction)
            .map(|rules| {
                rules
                    .iter()
                    .map(|(name, content)| PromptAtom {
                        name: name.clone(),
                        content: content.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rules)
    }

    async fn prompt_graph_is_empty(&self) -> Result<bool, PotikError> {
        Ok(self.state.lock().unwrap().roles.is_empty())
    }

    async fn seed_prompt_graph(&self, seeds: &[PromptSeed]) -> Result<(), PotikError> {
        let mut state = self.state.lock().unwrap();
        for seed in seeds {
            state
                .roles
                .entry(seed.role_name.clone())
                .or_insert_with(|| seed.role_description.clone());

            if !state
                .role_tasks
                .iter()
                .any(|(r, t, _)| r == &seed.role_name && t == &seed.task_name)
            {
                state.role_tasks.push((
                    seed.role_name.clone(),
                    seed.task_name.clone(),
                    seed.task_description.clone(),
                ));
            }

            for instruction in &seed.instructions {
                if !state.instructions.iter().any(|row| row.name == instruction.name) {
                    state.instructions.push(PromptInstructionRow {
                        role: seed.role_name.clone(),
                        task: seed.task_name.clone(),
                        name: instruction.name.clone(),
                        content: instruction.content.clone(),
                        order: instruction.order,
                    });
                }
                let rules = state
                    .instruction_rules
                    .entry(instruction.name.clone())
                    .or_default();
                for rule in &instruction.rules {
                    if !rules.iter().any(|(name, _)| name == &rule.name) {
                        rules.push((rule.name.clone(), rule.content.clone()));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use potik_core::types::{ChatKind, EntityKind, EntityRef, TopicRef};

    fn event(chat_id: i64, message_id: i64, ts: f64) -> IngestEvent {
        IngestEvent {
            chat_id,
            message_id,
            source: EventSource::User,
            sender_id: 42,
            sender_name: Some("Maks".into()),
            chat_kind: ChatKind::Group,
            text: format!("msg {message_id}"),
            timestamp: ts,
            media: None,
        }
    }

    #[tokio::test]
    async fn persist_is_idempotent_by_uid() {
        let graph = MemoryGraph::new();
        let e = event(1, 100, 10.0);
        graph.persist_event(&e).await.unwrap();
        graph.persist_event(&e).await.unwrap();
        assert_eq!(graph.messages().len(), 1);
    }

    #[tokio::test]
    async fn last_event_repoints_and_chains_next() {
        let graph = MemoryGraph::new();
        graph.persist_event(&event(1, 1, 10.0)).await.unwrap();
        graph.persist_event(&event(1, 2, 11.0)).await.unwrap();
        graph.persist_event(&event(1, 3, 12.0)).await.unwrap();

        assert_eq!(graph.last_event(1).unwrap().0, "1:3");
        let edges = graph.next_edges();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0], (MessageUid::new(1, 1), MessageUid::new(1, 2)));
        assert_eq!(edges[1], (MessageUid::new(1, 2), MessageUid::new(1, 3)));
    }

    #[tokio::test]
    async fn enrichment_is_idempotent() {
        let graph = MemoryGraph::new();
        graph.persist_event(&event(1, 1, 10.0)).await.unwrap();
        let enrichment = Enrichment {
            msg_uid: MessageUid::new(1, 1),
            topics: vec![TopicRef {
                title: "Docker".into(),
                is_new: true,
            }],
            entities: vec![EntityRef {
                name: "Docker".into(),
                kind: EntityKind::Technology,
            }],
            narrative: String::new(),
        };
        graph.apply_enrichment(&enrichment).await.unwrap();
        graph.apply_enrichment(&enrichment).await.unwrap();

        assert_eq!(graph.topic_count(), 1);
        assert_eq!(graph.discusses_count(&MessageUid::new(1, 1), "Docker"), 1);
        assert_eq!(graph.entity_type("Docker").unwrap(), "Technology");
    }

    #[tokio::test]
    async fn chat_context_is_chronological_and_limited() {
        let graph = MemoryGraph::new();
        for i in 0..5 {
            graph.persist_event(&event(1, i, 10.0 + i as f64)).await.unwrap();
        }
        graph.persist_event(&event(2, 99, 100.0)).await.unwrap();

        let context = graph.chat_context(1, 3).await.unwrap();
        assert_eq!(context.len(), 3);
        assert_eq!(context[0].text, "msg 2");
        assert_eq!(context[2].text, "msg 4");
    }

    #[tokio::test]
    async fn scripted_persist_failures_surface() {
        let graph = MemoryGraph::new();
        graph.fail_next_persists(1);
        assert!(graph.persist_event(&event(1, 1, 1.0)).await.is_err());
        assert!(graph.persist_event(&event(1, 1, 1.0)).await.is_ok());
    }
}
