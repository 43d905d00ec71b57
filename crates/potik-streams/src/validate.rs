// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! First-class validation of LLM outputs.
//!
//! Every LLM response crossing back into the pipeline passes a tagged
//! validator here before use: the gatekeeper verdict, the Thinker's
//! enrichment JSON, the Analyst's task plan, and the Researcher's Cypher.
//! Validation failures are `PotikError::Validation`, which the callers turn
//! into one stricter retry and then a safe default.

use std::collections::{HashMap, HashSet, VecDeque};

use potik_core::traits::strip_code_fences;
use potik_core::types::{
    EntityRef, GateVerdict, Intent, PlanTask, TaskAction, TopicRef,
};
use potik_core::PotikError;
use serde::Deserialize;

/// Parsed Thinker output, before it is keyed by message uid.
#[derive(Debug, Clone, Deserialize)]
pub struct ThinkerOutput {
    #[serde(default)]
    pub topics: Vec<TopicRef>,
    #[serde(default)]
    pub entities: Vec<EntityRef>,
    #[serde(default)]
    pub narrative: String,
}

/// Parsed Analyst output, before plan validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedPlan {
    pub intent: Intent,
    #[serde(default)]
    pub tasks: Vec<PlanTask>,
}

/// Parse a gatekeeper verdict from a raw LLM reply.
pub fn parse_verdict(raw: &str) -> Result<GateVerdict, PotikError> {
    serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| PotikError::Validation(format!("gatekeeper verdict: {e}")))
}

/// Parse the Thinker's enrichment JSON from a raw LLM reply.
pub fn parse_thinker_output(raw: &str) -> Result<ThinkerOutput, PotikError> {
    serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| PotikError::Validation(format!("thinker output: {e}")))
}

/// Parse the Analyst's plan JSON from a raw LLM reply.
pub fn parse_plan(raw: &str) -> Result<ParsedPlan, PotikError> {
    serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| PotikError::Validation(format!("analyst plan: {e}")))
}

/// Structural plan validation: unique ids, resolvable dependencies, acyclic,
/// and at least one `reply` leaf.
pub fn validate_plan(tasks: &[PlanTask]) -> Result<(), PotikError> {
    if tasks.is_empty() {
        return Err(PotikError::Validation("plan has no tasks".into()));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        if !ids.insert(task.id) {
            return Err(PotikError::Validation(format!(
                "duplicate task id {}",
                task.id
            )));
        }
    }

    for task in tasks {
        for dep in &task.depends_on {
            if !ids.contains(dep) {
                return Err(PotikError::Validation(format!(
                    "task {} depends on unknown task {dep}",
                    task.id
                )));
            }
            if *dep == task.id {
                return Err(PotikError::Validation(format!(
                    "task {} depends on itself",
                    task.id
                )));
            }
        }
    }

    // Kahn's algorithm both detects cycles and yields the level order used
    // by the Coordinator; here only acyclicity matters.
    topo_levels(tasks)?;

    let depended_on: HashSet<u32> = tasks
        .iter()
        .flat_map(|t| t.depends_on.iter().copied())
        .collect();
    let has_reply_leaf = tasks
        .iter()
        .any(|t| t.action == TaskAction::Reply && !depended_on.contains(&t.id));
    if !has_reply_leaf {
        return Err(PotikError::Validation("plan has no reply leaf".into()));
    }

    Ok(())
}

/// Topologically sorted execution levels; tasks within one level have all
/// dependencies satisfied by earlier levels and may run concurrently.
pub fn topo_levels(tasks: &[PlanTask]) -> Result<Vec<Vec<PlanTask>>, PotikError> {
    let mut indegree: HashMap<u32, usize> = HashMap::new();
    let mut dependents: HashMap<u32, Vec<u32>> = HashMap::new();
    let by_id: HashMap<u32, &PlanTask> = tasks.iter().map(|t| (t.id, t)).collect();

    for task in tasks {
        indegree.insert(task.id, task.depends_on.len());
        for dep in &task.depends_on {
            dependents.entry(*dep).or_default().push(task.id);
        }
    }

    let mut ready: VecDeque<u32> = tasks
        .iter()
        .filter(|t| t.depends_on.is_empty())
        .map(|t| t.id)
        .collect();

    let mut levels = Vec::new();
    let mut resolved = 0usize;

    while !ready.is_empty() {
        let level_ids: Vec<u32> = ready.drain(..).collect();
        let mut level = Vec::with_capacity(level_ids.len());
        for id in &level_ids {
            level.push((*by_id[id]).clone());
            resolved += 1;
            for dependent in dependents.get(id).cloned().unwrap_or_default() {
                let remaining = indegree.get_mut(&dependent).expect("known task id");
                *remaining -= 1;
                if *remaining == 0 {
                    ready.push_back(dependent);
                }
            }
        }
        levels.push(level);
    }

    if resolved != tasks.len() {
        return Err(PotikError::Validation("plan contains a cycle".into()));
    }
    Ok(levels)
}

/// Cypher keywords that make a research query a write.
const FORBIDDEN_KEYWORDS: &[&str] = &["CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP"];

/// Maximum LIMIT a research query may carry.
const MAX_RESEARCH_LIMIT: u64 = 50;

/// Validate a researcher-generated query: read-only shape, no write
/// keywords, and a present `LIMIT ≤ 50`. A missing or oversized limit is a
/// failure, never silently rewritten.
pub fn validate_research_query(query: &str) -> Result<(), PotikError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(PotikError::Validation("empty research query".into()));
    }

    let upper = trimmed.to_uppercase();
    let tokens: Vec<&str> = upper
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    if !tokens.contains(&"MATCH") || !tokens.contains(&"RETURN") {
        return Err(PotikError::Validation(
            "research query must MATCH and RETURN".into(),
        ));
    }

    for keyword in FORBIDDEN_KEYWORDS {
        if tokens.contains(keyword) {
            return Err(PotikError::Validation(format!(
                "research query contains forbidden keyword {keyword}"
            )));
        }
    }

    let limit = tokens
        .iter()
        .position(|t| *t == "LIMIT")
        .and_then(|i| tokens.get(i + 1))
        .and_then(|t| t.parse::<u64>().ok());
    match limit {
        Some(limit) if limit <= MAX_RESEARCH_LIMIT => Ok(()),
        Some(limit) => Err(PotikError::Validation(format!(
            "research query LIMIT {limit} exceeds {MAX_RESEARCH_LIMIT}"
        ))),
        None => Err(PotikError::Validation(
            "research query must carry a numeric LIMIT".into(),
        )),
    }
}
