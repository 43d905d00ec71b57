// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Researcher: agentic retrieval against the knowledge graph.
//!
//! Asks the LLM to formulate a Cypher query for a natural-language question,
//! validates it (read-only, bounded LIMIT), executes it, and summarizes the
//! rows back to natural language. An empty result gets one refinement
//! iteration; a validation failure rejects the task without execution.

use std::sync::Arc;

use potik_core::traits::{strip_code_fences, LlmRequest};
use potik_core::PotikError;
use potik_graph::GraphStore;
use potik_prompt::PromptAssembler;
use potik_switchboard::Switchboard;
use tracing::{debug, info};

use crate::validate::validate_research_query;

/// Maximum query-and-execute iterations per question.
const MAX_ITERATIONS: usize = 2;

/// Rows fed into the summarization prompt.
const SUMMARY_ROWS: usize = 5;

/// Schema summary shown to the query-writing model. Mirrors the persisted
/// shape; natural-language parts stay Ukrainian.
const SCHEMA_SUMMARY: &str = "\
Граф PrimaryMemory має таку схему:\n\
- (:User {telegram_id, name}) — користувачі\n\
- (:Agent {telegram_id, name}) — агент\n\
- (:Chat {chat_id, name, type}) — чати\n\
- (:Message {uid, message_id, text, created_at, name}) — повідомлення\n\
- (:Topic {title, description, status}) — теми розмов\n\
- (:Entity {name, type, description}) — сутності\n\
- (:Day {date}), (:Year {value}) — час\n\
Зв'язки: [:AUTHORED] User->Message, [:GENERATED] Agent->Message, \
[:HAPPENED_IN] Message->Chat, [:HAPPENED_AT {time}] Message->Day, \
[:NEXT] Message->Message, [:LAST_EVENT] Chat->Message, \
[:DISCUSSES] Message->Topic, [:INVOLVES] Topic->Entity, \
[:MENTIONS] Message->Entity, [:MONTH {number}] Year->Day.";

/// Retrieval tool invoked by the Coordinator for `search_graph` tasks.
pub struct Researcher {
    store: Arc<dyn GraphStore>,
    switchboard: Arc<Switchboard>,
    assembler: Arc<PromptAssembler>,
}

impl Researcher {
    pub fn new(
        store: Arc<dyn GraphStore>,
        switchboard: Arc<Switchboard>,
        assembler: Arc<PromptAssembler>,
    ) -> Self {
        Self {
            store,
            switchboard,
            assembler,
        }
    }

    /// Answer a question from the graph. Returns the natural-language
    /// summary, or a validation error when the generated query is rejected.
    pub async fn answer(&self, question: &str) -> Result<String, PotikError> {
        let mut previous_empty = false;

        for iteration in 0..MAX_ITERATIONS {
            let cypher = self.generate_query(question, previous_empty).await?;
            validate_research_query(&cypher)?;
            debug!(iteration, cypher = cypher.as_str(), "executing research query");

            let rows = self.store.run_readonly(&cypher).await?;
            if rows.is_empty() {
                info!(iteration, "research query returned nothing");
                previous_empty = true;
                continue;
            }

            info!(rows = rows.len(), "research query found results");
            return self.summarize(&cypher, &rows).await;
        }

        Ok("У базі знань немає інформації за цим запитом.".to_string())
    }

    async fn generate_query(
        &self,
        question: &str,
        previous_empty: bool,
    ) -> Result<String, PotikError> {
        let system = self.assembler.assemble("Researcher", Some("GraphQuery")).await?;

        let mut user_prompt = format!("{SCHEMA_SUMMARY}\n\nПитання: {question}");
        if previous_empty {
            user_prompt.push_str(
                "\n\nПопередній запит нічого не знайшов. Спробуй ширші ключові слова \
                 або інший шлях по графу.",
            );
        }

        let reply = self
            .switchboard
            .call(&LlmRequest::prompt(Some(system), user_prompt))
            .await?;
        Ok(strip_code_fences(&reply.content).to_string())
    }

    async fn summarize(
        &self,
        cypher: &str,
        rows: &[serde_json::Value],
    ) -> Result<String, PotikError> {
        let sample = serde_json::to_string_pretty(&rows[..rows.len().min(SUMMARY_ROWS)])
            .unwrap_or_else(|_| "[]".to_string());
        let user_prompt = format!(
            "Ти отримав результати запиту до Графа Знань. Інтерпретуй їх і дай коротку \
             відповідь по суті.\n\nЗапит: {cypher}\nРезультати: {sample}\n\nВідповідь:"
        );

        match self
            .switchboard
            .call(&LlmRequest::prompt(None, user_prompt))
            .await
        {
            Ok(reply) => Ok(reply.content.trim().to_string()),
            // Summarization failure degrades to a count, not an error.
            Err(e) => {
                debug!(error = %e, "summarization failed, returning row count");
                Ok(format!("Знайдено {} записів у базі знань.", rows.len()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use potik_test_utils::{MemoryGraph, MockProvider};
    use std::time::Duration;

    struct Fixture {
        researcher: Researcher,
        store: Arc<MemoryGraph>,
        provider: Arc<MockProvider>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryGraph::new());
        let provider = Arc::new(MockProvider::named("mock"));
        let switchboard = Arc::new(Switchboard::new(
            vec![provider.clone()],
            Duration::from_secs(30),
        ));
        let assembler = Arc::new(PromptAssembler::new(store.clone(), Duration::from_secs(60)));
        Fixture {
            researcher: Researcher::new(store.clone(), switchboard, assembler),
            store,
            provider,
        }
    }

    const GOOD_QUERY: &str =
        "MATCH (m:Message) WHERE toLower(m.text) CONTAINS 'docker' RETURN m.text LIMIT 10";

    #[tokio::test]
    async fn happy_path_query_execute_summarize() {
        let f = fixture();
        f.provider.push_response(GOOD_QUERY);
        f.provider.push_response("Вчора Макс згадував docker compose.");
        f.store.script_readonly_result(vec![serde_json::json!({"m.text": "docker compose"})]);

        let answer = f.researcher.answer("що казали про docker?").await.unwrap();
        assert_eq!(answer, "Вчора Макс згадував docker compose.");
        assert_eq!(f.store.readonly_queries(), vec![GOOD_QUERY.to_string()]);
    }

    #[tokio::test]
    async fn write_query_is_rejected_without_execution() {
        let f = fixture();
        f.provider
            .push_response("MATCH (n) SET n.hacked = true RETURN n LIMIT 1");

        let err = f.researcher.answer("питання").await.unwrap_err();
        assert!(matches!(err, PotikError::Validation(_)));
        assert!(f.store.readonly_queries().is_empty());
    }

    #[tokio::test]
    async fn missing_limit_is_rejected() {
        let f = fixture();
        f.provider.push_response("MATCH (m:Message) RETURN m.text");

        let err = f.researcher.answer("питання").await.unwrap_err();
        assert!(err.to_string().contains("LIMIT"));
    }

    #[tokio::test]
    async fn empty_result_triggers_one_refinement() {
        let f = fixture();
        f.provider.push_response(GOOD_QUERY);
        f.provider.push_response(GOOD_QUERY);
        f.provider.push_response("Ось що знайшлося.");
        // First execution: empty; second: a row.
        f.store.script_readonly_result(vec![]);
        f.store
            .script_readonly_result(vec![serde_json::json!({"m.text": "docker"})]);

        let answer = f.researcher.answer("docker?").await.unwrap();
        assert_eq!(answer, "Ось що знайшлося.");
        assert_eq!(f.store.readonly_queries().len(), 2);

        // The refinement prompt told the model the first try was empty.
        let requests = f.provider.requests();
        assert!(requests[1].messages[0].content.contains("нічого не знайшов"));
    }

    #[tokio::test]
    async fn two_empty_iterations_return_not_found() {
        let f = fixture();
        f.provider.push_response(GOOD_QUERY);
        f.provider.push_response(GOOD_QUERY);

        let answer = f.researcher.answer("docker?").await.unwrap();
        assert!(answer.contains("немає інформації"));
        assert_eq!(f.store.readonly_queries().len(), 2);
    }

    #[tokio::test]
    async fn fenced_query_is_unwrapped() {
        let f = fixture();
        f.provider.push_response(format!("```cypher\n{GOOD_QUERY}\n```"));
        f.provider.push_response("відповідь");
        f.store
            .script_readonly_result(vec![serde_json::json!({"m.text": "docker"})]);

        f.researcher.answer("docker?").await.unwrap();
        assert_eq!(f.store.readonly_queries(), vec![GOOD_QUERY.to_string()]);
    }
}
