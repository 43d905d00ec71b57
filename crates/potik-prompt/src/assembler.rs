// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dynamic system prompt assembly from the prompt subgraph.
//!
//! Traverses `Role -> Task -> Protocol/Instruction -> Rule` and renders the
//! fixed template. Assembled prompts are cached per `(role, task)` with a
//! short TTL; any write to the prompt subgraph must call
//! [`PromptAssembler::invalidate`]. When the role is missing from the graph
//! the statically compiled Ukrainian default is served instead, with a
//! warning metric.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use potik_core::PotikError;
use potik_graph::GraphStore;
use tracing::{debug, warn};

use crate::defaults;

struct CachedPrompt {
    text: String,
    assembled_at: Instant,
}

/// Materializes system prompts from graph-resident prompt atoms.
pub struct PromptAssembler {
    store: Arc<dyn GraphStore>,
    ttl: Duration,
    cache: RwLock<HashMap<(String, String), CachedPrompt>>,
}

impl PromptAssembler {
    pub fn new(store: Arc<dyn GraphStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Assembles the system prompt for `(role, task)`.
    ///
    /// With `task = None` the role's single task is used; an ambiguous or
    /// missing task falls back like a missing role. Identical inputs return
    /// byte-identical prompts within the cache TTL.
    pub async fn assemble(&self, role: &str, task: Option<&str>) -> Result<String, PotikError> {
        let key = (role.to_string(), task.unwrap_or("").to_string());

        if let Some(cached) = self.cache_get(&key) {
            return Ok(cached);
        }

        let text = self.assemble_uncached(role, task).await?;
        self.cache_put(key, text.clone());
        Ok(text)
    }

    /// Appends caller-provided runtime context (RAG snippets, narrative,
    /// history) below an assembled prompt.
    pub fn with_context(base: &str, context: &str) -> String {
        if context.trim().is_empty() {
            base.to_string()
        } else {
            format!("{base}\n\n{context}")
        }
    }

    /// Drops every cached prompt. Called after prompt-subgraph writes.
    pub fn invalidate(&self) {
        self.cache.write().expect("prompt cache poisoned").clear();
        debug!("prompt cache invalidated");
    }

    async fn assemble_uncached(&self, role: &str, task: Option<&str>) -> Result<String, PotikError> {
        let Some(role_atom) = self.store.prompt_role(role).await? else {
            return self.fallback(role, "role missing from prompt graph");
        };

        let tasks = self.store.prompt_tasks(role).await?;
        let task_atom = match task {
            Some(name) => tasks.iter().find(|t| t.name == name),
            None if tasks.len() == 1 => tasks.first(),
            None => None,
        };
        let Some(task_atom) = task_atom else {
            return self.fallback(role, "task missing or ambiguous in prompt graph");
        };

        let instructions = self.store.prompt_instructions(role, &task_atom.name).await?;

        let mut rules: Vec<(String, String)> = Vec::new();
        for instruction in &instructions {
            for rule in self.store.prompt_rules(&instruction.name).await? {
                rules.push((rule.name, rule.content));
            }
        }
        // Stable sort by rule name so assembly is deterministic.
        rules.sort_by(|a, b| a.0.cmp(&b.0));
        rules.dedup();

        let instruction_texts: Vec<String> =
            instructions.into_iter().map(|i| i.content).collect();
        let rule_texts: Vec<String> = rules.into_iter().map(|(_, content)| content).collect();

        Ok(render_template(
            &role_atom.content,
            &task_atom.content,
            &instruction_texts,
            &rule_texts,
        ))
    }

    fn fallback(&self, role: &str, reason: &str) -> Result<String, PotikError> {
        match defaults::static_prompt(role) {
            Some(text) => {
                warn!(role, reason, "serving static default prompt");
                potik_metrics::record_prompt_fallback(role);
                Ok(text)
            }
            None => Err(PotikError::RoleNotFound {
                role: role.to_string(),
            }),
        }
    }

    fn cache_get(&self, key: &(String, String)) -> Option<String> {
        let cache = self.cache.read().expect("prompt cache poisoned");
        let cached = cache.get(key)?;
        if cached.assembled_at.elapsed() < self.ttl {
            Some(cached.text.clone())
        } else {
            None
        }
    }

    fn cache_put(&self, key: (String, String), text: String) {
        self.cache.write().expect("prompt cache poisoned").insert(
            key,
            CachedPrompt {
                text,
                assembled_at: Instant::now(),
            },
        );
    }
}

/// The fixed assembly template shared by graph prompts and static defaults.
pub fn render_template(
    role_description: &str,
    task_description: &str,
    instructions: &[String],
    rules: &[String],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("ROLE: {role_description}\n"));
    out.push_str(&format!("TASK: {task_description}\n"));
    out.push_str("PROTOCOL:\n");
    for instruction in instructions {
        out.push_str(&format!("  - {instruction}\n"));
    }
    out.push_str("RULES:\n");
    for rule in rules {
        out.push_str(&format!("  * {rule}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use potik_test_utils::MemoryGraph;

    async fn seeded_assembler(ttl: Duration) -> PromptAssembler {
        let store = Arc::new(MemoryGraph::new());
        store.seed_prompt_graph(&defaults::seeds()).await.unwrap();
        PromptAssembler::new(store, ttl)
    }

    #[tokio::test]
    async fn assembles_template_from_graph() {
        let assembler = seeded_assembler(Duration::from_secs(60)).await;
        let prompt = assembler.assemble("Thinker", Some("SemanticAnalysis")).await.unwrap();

        assert!(prompt.starts_with("ROLE: Ти — Мислитель."));
        assert!(prompt.contains("TASK: Проаналізуй"));
        assert!(prompt.contains("PROTOCOL:\n  - "));
        assert!(prompt.contains("RULES:\n  * "));
    }

    #[tokio::test]
    async fn single_task_role_needs_no_task_name() {
        let assembler = seeded_assembler(Duration::from_secs(60)).await;
        let named = assembler.assemble("Responder", Some("ComposeReply")).await.unwrap();
        let inferred = assembler.assemble("Responder", None).await.unwrap();
        assert_eq!(named, inferred);
    }

    #[tokio::test]
    async fn identical_inputs_are_byte_identical_within_ttl() {
        let assembler = seeded_assembler(Duration::from_secs(60)).await;
        let first = assembler.assemble("Analyst", None).await.unwrap();
        let second = assembler.assemble("Analyst", None).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn invalidate_clears_the_cache() {
        let store = Arc::new(MemoryGraph::new());
        store.seed_prompt_graph(&defaults::seeds()).await.unwrap();
        let assembler = PromptAssembler::new(store.clone(), Duration::from_secs(600));

        let before = assembler.assemble("Thinker", None).await.unwrap();
        store.set_role_description("Thinker", "Оновлений опис");
        // Still cached.
        assert_eq!(assembler.assemble("Thinker", None).await.unwrap(), before);

        assembler.invalidate();
        let after = assembler.assemble("Thinker", None).await.unwrap();
        assert!(after.contains("Оновлений опис"));
    }

    #[tokio::test]
    async fn empty_graph_serves_static_default() {
        let store = Arc::new(MemoryGraph::new());
        let assembler = PromptAssembler::new(store, Duration::from_secs(60));
        let prompt = assembler.assemble("Gatekeeper", Some("Triage")).await.unwrap();
        assert_eq!(prompt, defaults::static_prompt("Gatekeeper").unwrap());
    }

    #[tokio::test]
    async fn unknown_role_without_default_errors() {
        let store = Arc::new(MemoryGraph::new());
        let assembler = PromptAssembler::new(store, Duration::from_secs(60));
        let err = assembler.assemble("Barista", None).await.unwrap_err();
        assert!(matches!(err, PotikError::RoleNotFound { .. }));
    }

    #[tokio::test]
    async fn with_context_appends_below() {
        let combined = PromptAssembler::with_context("BASE", "context lines");
        assert_eq!(combined, "BASE\n\ncontext lines");
        assert_eq!(PromptAssembler::with_context("BASE", "  "), "BASE");
    }

    #[test]
    fn template_shape_is_fixed() {
        let rendered = render_template(
            "опис ролі",
            "опис задачі",
            &["перша інструкція".to_string(), "друга".to_string()],
            &["правило".to_string()],
        );
        assert_eq!(
            rendered,
            "ROLE: опис ролі\nTASK: опис задачі\nPROTOCOL:\n  - перша інструкція\n  - друга\nRULES:\n  * правило\n"
        );
    }
}
