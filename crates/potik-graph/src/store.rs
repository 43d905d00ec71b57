// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `GraphStore` trait: every graph operation the pipeline performs.
//!
//! `FalkorStore` implements it against a live graph endpoint; the test
//! utilities provide an in-memory implementation so the whole pipeline runs
//! in CI without a server.

use async_trait::async_trait;
use potik_core::types::{AnalystSnapshot, Enrichment, IngestEvent, MessageUid};
use potik_core::PotikError;

/// One line of recent chat history, as consumed by prompt builders.
#[derive(Debug, Clone)]
pub struct ContextLine {
    pub author: String,
    pub text: String,
    /// `HH:MM:SS` from the HAPPENED_AT edge.
    pub time: String,
    pub created_at: f64,
}

/// A persisted message, as read back for backfill.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub uid: MessageUid,
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    pub created_at: f64,
}

/// An active Topic node.
#[derive(Debug, Clone)]
pub struct TopicInfo {
    pub title: String,
    pub description: String,
}

/// A prompt-subgraph node projected to `(name, content)`.
///
/// For Role and Task nodes `content` holds the `description` property.
#[derive(Debug, Clone)]
pub struct PromptAtom {
    pub name: String,
    pub content: String,
}

/// A rule attached to one instruction during seeding.
#[derive(Debug, Clone)]
pub struct SeedRule {
    pub name: String,
    pub content: String,
}

/// An instruction and its rules during seeding.
#[derive(Debug, Clone)]
pub struct SeedInstruction {
    pub name: String,
    pub content: String,
    pub order: u32,
    pub rules: Vec<SeedRule>,
}

/// A complete Role → Task → Protocol → Instruction → Rule subtree used to
/// bootstrap the prompt subgraph when it is empty.
#[derive(Debug, Clone)]
pub struct PromptSeed {
    pub role_name: String,
    pub role_description: String,
    pub task_name: String,
    pub task_description: String,
    pub protocol_name: String,
    pub instructions: Vec<SeedInstruction>,
}

/// Every graph operation the pipeline performs, over both logical graphs.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Round-trips both logical graphs.
    async fn ping(&self) -> Result<(), PotikError>;

    /// Materializes uniqueness constraints. Idempotent.
    async fn ensure_schema(&self) -> Result<(), PotikError>;

    // --- Scribe ---

    /// Persists one raw event: upserts identity/chat/time nodes, creates the
    /// Message with authorship, and repoints LAST_EVENT. Idempotent by uid;
    /// a duplicate call is a no-op returning the existing uid.
    async fn persist_event(&self, event: &IngestEvent) -> Result<MessageUid, PotikError>;

    /// Applies semantic enrichment: upserts Topics/Entities and creates the
    /// DISCUSSES / INVOLVES / MENTIONS edges. Idempotent.
    async fn apply_enrichment(&self, enrichment: &Enrichment) -> Result<(), PotikError>;

    // --- Context reads ---

    /// Last `limit` messages of the chat, oldest first.
    async fn chat_context(&self, chat_id: i64, limit: usize)
        -> Result<Vec<ContextLine>, PotikError>;

    async fn active_topics(&self) -> Result<Vec<TopicInfo>, PotikError>;

    /// Distinct entity kinds present in the graph.
    async fn entity_kinds(&self) -> Result<Vec<String>, PotikError>;

    async fn message_exists(&self, uid: &MessageUid) -> Result<bool, PotikError>;

    /// Most recent persisted messages across chats, newest first (backfill).
    async fn recent_messages(&self, limit: usize) -> Result<Vec<StoredMessage>, PotikError>;

    // --- Reasoning chain ---

    /// Writes the Thinker's narrative snapshot linked TRIGGERED from the
    /// message; returns the snapshot id.
    async fn save_thought_snapshot(
        &self,
        uid: &MessageUid,
        narrative: &str,
        model: &str,
    ) -> Result<String, PotikError>;

    /// Writes the Analyst's plan snapshot, chained LED_TO from the narrative
    /// snapshot when one exists; returns the snapshot id.
    async fn save_plan_snapshot(
        &self,
        narrative_id: Option<&str>,
        snapshot: &AnalystSnapshot,
    ) -> Result<String, PotikError>;

    /// Closes the chain with the Coordinator's execution summary.
    async fn save_execution_snapshot(
        &self,
        plan_id: &str,
        summary: &str,
    ) -> Result<String, PotikError>;

    // --- Thought log (second logical graph) ---

    /// Appends a prompt/response pair to the ThoughtLog graph.
    async fn log_thought(
        &self,
        prompt: &str,
        response: &str,
        model: &str,
    ) -> Result<(), PotikError>;

    /// Recent ThoughtLog responses, newest first.
    async fn recent_thoughts(&self, limit: usize) -> Result<Vec<String>, PotikError>;

    // --- Operational events ---

    /// Records a SystemEvent node (provider failovers, incidents).
    async fn log_system_event(
        &self,
        kind: &str,
        source: &str,
        severity: &str,
        details: &str,
    ) -> Result<(), PotikError>;

    // --- Agent working state ---

    /// Replaces the agent's WORKING_ON edge with one pointing at a fresh
    /// Task node labelled `task_label`.
    async fn set_working_on(&self, task_label: &str) -> Result<(), PotikError>;

    /// Deletes the WORKING_ON edge and its Task node, if any.
    async fn clear_working_on(&self) -> Result<(), PotikError>;

    // --- Coordinator MidCheck ---

    /// Whether any user-authored message in the chat has
    /// `created_at >= since_epoch`. Agent messages are excluded so the
    /// Coordinator's own loop-backs never abort a running plan.
    async fn newer_message_in_chat(
        &self,
        chat_id: i64,
        since_epoch: f64,
    ) -> Result<bool, PotikError>;

    // --- Plan tools ---

    /// Short natural-language profile of a user: identity plus recent
    /// authored messages.
    async fn user_profile(&self, name: &str) -> Result<String, PotikError>;

    /// Upserts a Concept entity carrying the fact text.
    async fn remember_fact(&self, fact: &str) -> Result<(), PotikError>;

    // --- Researcher ---

    /// Executes an already-validated read-only statement against the primary
    /// graph; rows come back keyed by header name.
    async fn run_readonly(&self, cypher: &str) -> Result<Vec<serde_json::Value>, PotikError>;

    // --- Prompt subgraph ---

    /// The Role node, projected to `(name, description)`.
    async fn prompt_role(&self, role: &str) -> Result<Option<PromptAtom>, PotikError>;

    /// Tasks the role is RESPONSIBLE_FOR, projected to `(name, description)`.
    async fn prompt_tasks(&self, role: &str) -> Result<Vec<PromptAtom>, PotikError>;

    /// Ordered instructions for a task: protocol-composed first (by `order`),
    /// then direct FOLLOWS instructions.
    async fn prompt_instructions(
        &self,
        role: &str,
        task: &str,
    ) -> Result<Vec<PromptAtom>, PotikError>;

    /// Rules ENFORCED by an instruction, sorted by rule name.
    async fn prompt_rules(&self, instruction: &str) -> Result<Vec<PromptAtom>, PotikError>;

    /// Whether the prompt subgraph holds any Role node.
    async fn prompt_graph_is_empty(&self) -> Result<bool, PotikError>;

    /// Merges the given seed subtrees into the prompt subgraph. Idempotent.
    async fn seed_prompt_graph(&self, seeds: &[PromptSeed]) -> Result<(), PotikError>;
}
