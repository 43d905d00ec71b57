// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete cognitive stream pipeline.
//!
//! Each test spawns the full worker topology against an in-memory graph
//! store, scripted providers, and a recording transport, then drives it
//! through `deliver_event` exactly as the Telegram adapter would.

use std::sync::Arc;
use std::time::Duration;

use potik_config::PotikConfig;
use potik_core::traits::{CallError, LlmProvider};
use potik_core::types::{ChatKind, EventSource, IngestEvent, MessageUid};
use potik_graph::GraphStore;
use potik_prompt::PromptAssembler;
use potik_streams::validate::validate_research_query;
use potik_streams::Pipeline;
use potik_switchboard::Switchboard;
use potik_test_utils::{MemoryGraph, MockProvider, MockTransport};
use tokio_util::sync::CancellationToken;

struct Harness {
    pipeline: Pipeline,
    store: Arc<MemoryGraph>,
    transport: Arc<MockTransport>,
    cancel: CancellationToken,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn spawn_harness(providers: Vec<Arc<MockProvider>>, seed_prompts: bool) -> Harness {
    let config = PotikConfig::default();
    let store = Arc::new(MemoryGraph::new());
    if seed_prompts {
        store.seed_prompt_graph(&potik_prompt::seeds()).await.unwrap();
    }

    let dyn_providers: Vec<Arc<dyn LlmProvider>> = providers
        .into_iter()
        .map(|p| p as Arc<dyn LlmProvider>)
        .collect();
    let switchboard = Arc::new(
        Switchboard::new(dyn_providers, Duration::from_secs(30))
            .with_graph_logger(store.clone()),
    );
    let assembler = Arc::new(PromptAssembler::new(store.clone(), Duration::from_secs(60)));
    let transport = Arc::new(MockTransport::new());
    let cancel = CancellationToken::new();

    let pipeline = Pipeline::spawn(
        &config,
        store.clone(),
        switchboard,
        assembler,
        transport.clone(),
        cancel.clone(),
    );

    Harness {
        pipeline,
        store,
        transport,
        cancel,
    }
}

fn user_event(chat_id: i64, message_id: i64, text: &str, timestamp: f64) -> IngestEvent {
    IngestEvent {
        chat_id,
        message_id,
        source: EventSource::User,
        sender_id: 42,
        sender_name: Some("Maks".into()),
        chat_kind: ChatKind::Group,
        text: text.into(),
        timestamp,
        media: None,
    }
}

fn verdict(target: &str, depth: &str, tone: &str) -> String {
    format!(r#"{{"target":"{target}","required_depth":"{depth}","tone_hint":"{tone}"}}"#)
}

async fn wait_until(predicate: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

const WAIT: Duration = Duration::from_secs(5);

// ---- S1: direct question, happy path ----

#[tokio::test]
async fn direct_question_happy_path() {
    let provider = Arc::new(MockProvider::named("primary"));
    provider.push_response(verdict("DIRECT", "DEEP_ANALYSIS", "NEUTRAL"));
    provider.push_response(
        r#"{"topics":[{"title":"дати повідомлень","is_new":true}],
            "entities":[],
            "narrative":"Макс питає агента, яким днем датоване останнє повідомлення."}"#,
    );
    provider.push_response(
        r#"{"intent":"QUESTION","tasks":[
            {"id":1,"action":"search_graph","args":{"question":"дата останнього повідомлення"}},
            {"id":2,"action":"reply","depends_on":[1]}
        ]}"#,
    );
    provider.push_response(
        "MATCH (m:Message)-[:HAPPENED_AT]->(d:Day) RETURN d.date ORDER BY m.created_at DESC LIMIT 1",
    );
    provider.push_response("Останнє повідомлення датоване 2025-02-04.");
    provider.push_response("Сьогоднішнє, 4 лютого 2025 року.");

    let h = spawn_harness(vec![provider.clone()], true).await;
    h.pipeline
        .deliver_event(user_event(
            1,
            100,
            "Hey bot, what day is it in the latest message?",
            1_738_670_000.0,
        ))
        .await
        .unwrap();

    // Outbound reply produced.
    let transport = h.transport.clone();
    assert!(wait_until(move || !transport.sent().is_empty(), WAIT).await);
    let sent = h.transport.sent();
    assert_eq!(sent[0].0, 1);
    assert_eq!(sent[0].1, "Сьогоднішнє, 4 лютого 2025 року.");

    // The message node exists with the composed uid.
    assert!(h.store.message(&MessageUid::new(1, 100)).is_some());

    // Researcher ran a validated read-only query.
    let queries = h.store.readonly_queries();
    assert_eq!(queries.len(), 1);
    assert!(validate_research_query(&queries[0]).is_ok());

    // The agent's reply loops back and is persisted with source=agent,
    // repointing LAST_EVENT and extending the NEXT chain.
    let store = h.store.clone();
    assert!(
        wait_until(
            move || store
                .messages()
                .iter()
                .any(|m| m.source == EventSource::Agent),
            WAIT
        )
        .await
    );
    let agent_uid = h
        .store
        .messages()
        .iter()
        .find(|m| m.source == EventSource::Agent)
        .map(|m| m.uid.clone())
        .unwrap();
    assert_eq!(h.store.last_event(1), Some(agent_uid.clone()));
    assert!(h
        .store
        .next_edges()
        .contains(&(MessageUid::new(1, 100), agent_uid)));

    // Six calls: gatekeeper, thinker, analyst, query, summary, reply.
    assert_eq!(provider.calls(), 6);
}

// ---- S2: noise in a group chat, other addressee ----

#[tokio::test]
async fn other_user_noise_is_persisted_but_never_answered() {
    let provider = Arc::new(MockProvider::named("primary"));
    provider.push_response(verdict("OTHER_USER", "SKIP", "NEUTRAL"));

    let h = spawn_harness(vec![provider.clone()], true).await;
    h.pipeline
        .deliver_event(user_event(7, 11, "@alice look at this", 1_738_670_100.0))
        .await
        .unwrap();

    let p = provider.clone();
    assert!(wait_until(move || p.calls() == 1, WAIT).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(h.store.message(&MessageUid::new(7, 11)).is_some());
    assert!(h.transport.sent().is_empty());
    assert_eq!(provider.calls(), 1);
}

// ---- S3: provider failover ----

#[tokio::test]
async fn rate_limited_primary_fails_over_and_enters_cooldown() {
    let primary = Arc::new(MockProvider::named("cli_gemini"));
    primary.push_error(CallError::Retryable("429 rate limited".into()));

    let fallback = Arc::new(MockProvider::named("openai_compatible"));
    fallback.push_response(verdict("DIRECT", "QUICK_REPLY", "NEUTRAL"));
    fallback.push_response(r#"{"intent":"QUESTION","tasks":[{"id":1,"action":"reply"}]}"#);
    fallback.push_response("Відповідаю через запасного провайдера.");

    let h = spawn_harness(vec![primary.clone(), fallback.clone()], true).await;
    h.pipeline
        .deliver_event(user_event(1, 100, "Бобре, ти тут?", 1_738_670_000.0))
        .await
        .unwrap();

    let transport = h.transport.clone();
    assert!(wait_until(move || !transport.sent().is_empty(), WAIT).await);
    assert_eq!(h.transport.sent()[0].1, "Відповідаю через запасного провайдера.");

    // The primary was tried once, failed, and stayed in cooldown for the
    // rest of the pipeline's calls.
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 3);

    // The failover was recorded in the graph as a SystemEvent.
    let events = h.store.system_events();
    assert!(events
        .iter()
        .any(|(kind, source, _, _)| kind == "FALLBACK" && source == "cli_gemini"));
}

// ---- S4: mid-stream interruption ----

#[tokio::test]
async fn plan_superseded_by_newer_message_never_replies() {
    let provider = Arc::new(MockProvider::named("primary"));
    provider.push_response(verdict("DIRECT", "QUICK_REPLY", "NEUTRAL"));
    provider.push_response(r#"{"intent":"QUESTION","tasks":[{"id":1,"action":"reply"}]}"#);

    let h = spawn_harness(vec![provider.clone()], true).await;

    // A newer user message already sits in the chat (timestamped after any
    // plan for the older message will start).
    h.store
        .persist_event(&user_event(
            1,
            200,
            "а, забудь, інше питання",
            potik_core::types::epoch_now() + 120.0,
        ))
        .await
        .unwrap();

    h.pipeline
        .deliver_event(user_event(1, 100, "скільки буде 2+2?", 1_738_670_000.0))
        .await
        .unwrap();

    let p = provider.clone();
    assert!(wait_until(move || p.calls() == 2, WAIT).await);
    tokio::time::sleep(Duration::from_millis(150)).await;

    // The plan was aborted at MidCheck: no reply, no lingering lock edge.
    assert!(h.transport.sent().is_empty());
    assert!(h.store.working_on().is_none());
}

// ---- S5: malformed Thinker output ----

#[tokio::test]
async fn malformed_thinker_output_is_retried_once() {
    let provider = Arc::new(MockProvider::named("primary"));
    provider.push_response(verdict("DIRECT", "DEEP_ANALYSIS", "NEUTRAL"));
    provider.push_response("topics: Docker");
    provider.push_response(
        r#"{"topics":[{"title":"Docker","is_new":true}],
            "entities":[{"name":"Docker","type":"Technology"}],
            "narrative":"Макс розповідає про docker."}"#,
    );
    provider.push_response(r#"{"intent":"SMALL_TALK","tasks":[{"id":1,"action":"reply"}]}"#);
    provider.push_response("Docker — хороша штука.");

    let h = spawn_harness(vec![provider.clone()], true).await;
    h.pipeline
        .deliver_event(user_event(1, 100, "бобре, я розібрався з docker", 1_738_670_000.0))
        .await
        .unwrap();

    let transport = h.transport.clone();
    assert!(wait_until(move || !transport.sent().is_empty(), WAIT).await);

    // The retry produced valid enrichment, applied by the Scribe sidecar.
    let store = h.store.clone();
    assert!(wait_until(move || store.topic_count() == 1, WAIT).await);
    assert_eq!(h.store.entity_type("Docker").unwrap(), "Technology");
    assert_eq!(provider.calls(), 5);
}

// ---- S6: empty prompt subgraph ----

#[tokio::test]
async fn empty_prompt_graph_runs_on_static_defaults() {
    let provider = Arc::new(MockProvider::named("primary"));
    provider.push_response(verdict("DIRECT", "QUICK_REPLY", "HUMOR"));
    provider.push_response(r#"{"intent":"SMALL_TALK","tasks":[{"id":1,"action":"reply"}]}"#);
    provider.push_response("Працюю і без графа промптів!");

    // No seeding: the subgraph holds no Role nodes.
    let h = spawn_harness(vec![provider.clone()], false).await;
    h.pipeline
        .deliver_event(user_event(1, 100, "бобре, ти живий?", 1_738_670_000.0))
        .await
        .unwrap();

    let transport = h.transport.clone();
    assert!(wait_until(move || !transport.sent().is_empty(), WAIT).await);
    assert_eq!(h.transport.sent()[0].1, "Працюю і без графа промптів!");

    // The gatekeeper ran on the statically compiled Ukrainian default.
    let first_request = provider.requests().into_iter().next().unwrap();
    let system = first_request.system.unwrap();
    assert!(system.starts_with("ROLE: "));
    assert!(system.contains("Вартовий"));
}

// ---- Idempotence: at-least-once redelivery ----

#[tokio::test]
async fn redelivered_event_persists_exactly_once() {
    let provider = Arc::new(MockProvider::named("primary"));
    provider.push_response(verdict("NOBODY", "SKIP", "NEUTRAL"));
    provider.push_response(verdict("NOBODY", "SKIP", "NEUTRAL"));

    let h = spawn_harness(vec![provider.clone()], true).await;
    let event = user_event(1, 100, "просто повідомлення", 1_738_670_000.0);
    h.pipeline.deliver_event(event.clone()).await.unwrap();
    h.pipeline.deliver_event(event).await.unwrap();

    let p = provider.clone();
    assert!(wait_until(move || p.calls() == 2, WAIT).await);

    assert_eq!(h.store.messages().len(), 1);
    assert_eq!(h.store.last_event(1), Some(MessageUid::new(1, 100)));
    assert!(h.store.next_edges().is_empty());
}
