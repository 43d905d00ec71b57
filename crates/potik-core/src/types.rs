// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the pipeline stages.
//!
//! Every payload that crosses a stream-bus channel lives here, along with
//! the graph-facing identity types. All LLM-facing structures derive serde
//! so their JSON contracts are checked at the type level.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Globally unique message identity: `chat_id:message_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageUid(pub String);

impl MessageUid {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self(format!("{chat_id}:{message_id}"))
    }

    /// Split back into `(chat_id, message_id)` when the uid is well-formed.
    pub fn parts(&self) -> Option<(i64, i64)> {
        let (chat, msg) = self.0.split_once(':')?;
        Some((chat.parse().ok()?, msg.parse().ok()?))
    }
}

impl std::fmt::Display for MessageUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventSource {
    User,
    Agent,
}

/// Telegram chat kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
}

/// Non-text payload kinds that trigger the gatekeeper's hardware rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Sticker,
    Voice,
    Image,
}

/// A raw inbound event as delivered by the transport adapter (or looped back
/// from the Responder with `source = agent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestEvent {
    pub chat_id: i64,
    pub message_id: i64,
    pub source: EventSource,
    pub sender_id: i64,
    /// Display name of the sender, when the transport knows it.
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default = "default_chat_kind")]
    pub chat_kind: ChatKind,
    pub text: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// Present when the message carried media instead of (or alongside) text.
    #[serde(default)]
    pub media: Option<MediaKind>,
}

fn default_chat_kind() -> ChatKind {
    ChatKind::Group
}

impl IngestEvent {
    pub fn uid(&self) -> MessageUid {
        MessageUid::new(self.chat_id, self.message_id)
    }

    fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp as i64, 0).unwrap_or_else(Utc::now)
    }

    /// ISO day key (`yyyy-mm-dd`) for the Day node.
    pub fn day(&self) -> String {
        self.datetime().format("%Y-%m-%d").to_string()
    }

    /// `HH:MM:SS` attribute for the HAPPENED_AT edge.
    pub fn time_of_day(&self) -> String {
        self.datetime().format("%H:%M:%S").to_string()
    }

    pub fn year(&self) -> i32 {
        self.datetime().year()
    }

    pub fn month(&self) -> u32 {
        self.datetime().month()
    }

    /// `true` when the timestamp's time-of-day parses cleanly (guards against
    /// nonsense timestamps from misbehaving adapters).
    pub fn has_valid_timestamp(&self) -> bool {
        self.timestamp.is_finite() && self.timestamp >= 0.0
    }
}

/// Seconds since epoch, as the pipeline's common clock reading.
pub fn epoch_now() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.nanosecond()) / 1e9
}

// --- Gatekeeper verdict ---

/// Who the message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GateTarget {
    Direct,
    Contextual,
    Nobody,
    OtherUser,
}

/// How much downstream work the message deserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GateDepth {
    QuickReply,
    DeepAnalysis,
    Skip,
}

/// Suggested register for the eventual reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ToneHint {
    Humor,
    Serious,
    Neutral,
}

/// The triage tuple produced by the Gatekeeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateVerdict {
    pub target: GateTarget,
    pub required_depth: GateDepth,
    pub tone_hint: ToneHint,
}

impl GateVerdict {
    /// The safe default used when classification fails twice.
    pub fn skip() -> Self {
        Self {
            target: GateTarget::Nobody,
            required_depth: GateDepth::Skip,
            tone_hint: ToneHint::Neutral,
        }
    }

    /// Forced verdict for sticker/voice/image events.
    pub fn media_direct() -> Self {
        Self {
            target: GateTarget::Direct,
            required_depth: GateDepth::QuickReply,
            tone_hint: ToneHint::Neutral,
        }
    }

    pub fn is_skip(&self) -> bool {
        self.required_depth == GateDepth::Skip
    }
}

// --- Thinker enrichment ---

/// A topic mention detected by the Thinker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRef {
    pub title: String,
    #[serde(default)]
    pub is_new: bool,
}

/// Closed set of entity kinds the Thinker may tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum EntityKind {
    Technology,
    Person,
    Concept,
    Tool,
}

/// An entity mention detected by the Thinker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
}

/// Semantic enrichment for one message, consumed by the Scribe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrichment {
    pub msg_uid: MessageUid,
    #[serde(default)]
    pub topics: Vec<TopicRef>,
    #[serde(default)]
    pub entities: Vec<EntityRef>,
    #[serde(default)]
    pub narrative: String,
}

impl Enrichment {
    /// The empty enrichment emitted after the Thinker's second parse failure.
    pub fn empty(msg_uid: MessageUid) -> Self {
        Self {
            msg_uid,
            topics: Vec::new(),
            entities: Vec::new(),
            narrative: String::new(),
        }
    }
}

// --- Analyst plan ---

/// Message intent classified by the Analyst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Question,
    Command,
    SmallTalk,
    Noise,
}

/// Closed set of plan actions the Coordinator can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskAction {
    Reply,
    SearchGraph,
    SearchWeb,
    FetchUserProfile,
    RememberFact,
}

/// One node of the Analyst's task DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTask {
    pub id: u32,
    pub action: TaskAction,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default)]
    pub depends_on: Vec<u32>,
}

impl PlanTask {
    pub fn new(id: u32, action: TaskAction) -> Self {
        Self {
            id,
            action,
            args: serde_json::Value::Null,
            depends_on: Vec::new(),
        }
    }
}

/// The executable plan the Analyst hands to the Coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystSnapshot {
    pub msg_uid: MessageUid,
    pub chat_id: i64,
    pub intent: Intent,
    pub tasks: Vec<PlanTask>,
    /// Thinker narrative, when the message went through deep analysis.
    #[serde(default)]
    pub narrative: Option<String>,
    /// Graph id of the persisted plan snapshot, once written.
    #[serde(default)]
    pub snapshot_id: Option<String>,
    /// Original message text, kept for the Researcher and the Responder.
    pub trigger_text: String,
    pub gate: GateVerdict,
    /// Epoch seconds at plan creation; the Coordinator's MidCheck and the
    /// cancellation ordering consult this, never arrival order.
    pub created_at: f64,
}

impl AnalystSnapshot {
    /// The apology fallback emitted when plan validation fails twice.
    pub fn fallback(
        msg_uid: MessageUid,
        chat_id: i64,
        trigger_text: String,
        gate: GateVerdict,
    ) -> Self {
        let mut reply = PlanTask::new(1, TaskAction::Reply);
        reply.args = serde_json::json!({"style": "apology"});
        Self {
            msg_uid,
            chat_id,
            intent: Intent::SmallTalk,
            tasks: vec![reply],
            narrative: None,
            snapshot_id: None,
            trigger_text,
            gate,
            created_at: epoch_now(),
        }
    }
}

// --- Coordinator output ---

/// Terminal status of one executed plan task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Done,
    TimedOut,
    Failed,
    Rejected,
    Skipped,
}

/// Output of one plan task, visible to dependent tasks and the Responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub task_id: u32,
    pub action: TaskAction,
    pub status: TaskStatus,
    pub output: String,
}

impl ToolOutput {
    pub fn empty(task_id: u32, action: TaskAction, status: TaskStatus) -> Self {
        Self {
            task_id,
            action,
            status,
            output: String::new(),
        }
    }
}

/// The bundle the Coordinator passes to the Responder: plan plus tool outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub snapshot: AnalystSnapshot,
    pub outputs: Vec<ToolOutput>,
}

// --- Intermediate queue payloads ---

/// Scribe → Gatekeeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageJob {
    pub uid: MessageUid,
    pub event: IngestEvent,
}

/// Gatekeeper → Thinker (deep-analysis path only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub uid: MessageUid,
    pub event: IngestEvent,
    pub gate: GateVerdict,
}

/// Gatekeeper or Thinker → Analyst.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningJob {
    pub uid: MessageUid,
    pub event: IngestEvent,
    pub gate: GateVerdict,
    #[serde(default)]
    pub narrative: Option<String>,
    /// Graph id of the Thinker's narrative snapshot, when one was written.
    #[serde(default)]
    pub narrative_id: Option<String>,
}

/// Responder → transport adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_uid_round_trip() {
        let uid = MessageUid::new(1, 100);
        assert_eq!(uid.0, "1:100");
        assert_eq!(uid.parts(), Some((1, 100)));
        assert_eq!(MessageUid("garbage".into()).parts(), None);
    }

    #[test]
    fn verdict_serde_uses_wire_names() {
        let verdict = GateVerdict {
            target: GateTarget::OtherUser,
            required_depth: GateDepth::DeepAnalysis,
            tone_hint: ToneHint::Humor,
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["target"], "OTHER_USER");
        assert_eq!(json["required_depth"], "DEEP_ANALYSIS");
        assert_eq!(json["tone_hint"], "HUMOR");
    }

    #[test]
    fn verdict_rejects_unknown_fields() {
        let raw = r#"{"target":"DIRECT","required_depth":"SKIP","tone_hint":"NEUTRAL","extra":1}"#;
        assert!(serde_json::from_str::<GateVerdict>(raw).is_err());
    }

    #[test]
    fn task_action_wire_names() {
        let task: PlanTask =
            serde_json::from_str(r#"{"id":2,"action":"search_graph"}"#).unwrap();
        assert_eq!(task.action, TaskAction::SearchGraph);
        assert!(task.depends_on.is_empty());
        assert!(task.args.is_null());
    }

    #[test]
    fn entity_ref_uses_type_key() {
        let entity: EntityRef =
            serde_json::from_str(r#"{"name":"Docker","type":"Technology"}"#).unwrap();
        assert_eq!(entity.kind, EntityKind::Technology);
    }

    #[test]
    fn event_time_helpers() {
        let event = IngestEvent {
            chat_id: 1,
            message_id: 100,
            source: EventSource::User,
            sender_id: 42,
            sender_name: None,
            chat_kind: ChatKind::Group,
            text: "hi".into(),
            timestamp: 1_738_670_000.0,
            media: None,
        };
        assert_eq!(event.uid().0, "1:100");
        assert_eq!(event.day(), "2025-02-04");
        assert_eq!(event.year(), 2025);
        assert_eq!(event.month(), 2);
        assert!(event.has_valid_timestamp());
    }

    #[test]
    fn fallback_plan_is_single_apology_reply() {
        let snap = AnalystSnapshot::fallback(
            MessageUid::new(1, 2),
            1,
            "text".into(),
            GateVerdict::skip(),
        );
        assert_eq!(snap.tasks.len(), 1);
        assert_eq!(snap.tasks[0].action, TaskAction::Reply);
        assert_eq!(snap.tasks[0].args["style"], "apology");
    }
}
