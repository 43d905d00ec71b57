// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider switchboard: ordered failover with cooldown-based promotion.
//!
//! One logical call walks the ordered provider list at most once, skipping
//! providers in cooldown. A retryable failure marks the provider unhealthy
//! for the configured cooldown and moves on; a fatal failure aborts without
//! failover. Each failover increments `potik_provider_failovers_total` and is
//! recorded in the graph as a SystemEvent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use potik_core::traits::{strip_code_fences, CallError, LlmProvider, LlmReply, LlmRequest};
use potik_core::PotikError;
use potik_graph::GraphStore;
use tracing::{info, warn};

/// Routes LLM calls across an ordered list of providers.
pub struct Switchboard {
    providers: Vec<Arc<dyn LlmProvider>>,
    cooldown: Duration,
    /// Provider name -> instant until which it is skipped.
    unhealthy_until: Mutex<HashMap<String, Instant>>,
    graph: Option<Arc<dyn GraphStore>>,
}

impl Switchboard {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>, cooldown: Duration) -> Self {
        Self {
            providers,
            cooldown,
            unhealthy_until: Mutex::new(HashMap::new()),
            graph: None,
        }
    }

    /// Attach a graph store so failovers are recorded as SystemEvent nodes.
    pub fn with_graph_logger(mut self, graph: Arc<dyn GraphStore>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Names of the configured providers, in routing order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Routes one logical call. Never calls the same provider twice.
    pub async fn call(&self, request: &LlmRequest) -> Result<LlmReply, PotikError> {
        if self.providers.is_empty() {
            return Err(PotikError::provider("no providers configured"));
        }

        let mut last_reason: Option<String> = None;
        let mut attempted = 0usize;

        for (index, provider) in self.providers.iter().enumerate() {
            let name = provider.name().to_string();
            if self.in_cooldown(&name) {
                continue;
            }
            attempted += 1;

            match provider.generate(request).await {
                Ok(reply) => {
                    if let Some(schema) = &request.response_schema
                        && let Err(reason) = schema.validate(strip_code_fences(&reply.content))
                    {
                        // Schema violation consumes the retry: move on to the
                        // next provider without marking this one unhealthy.
                        warn!(provider = name.as_str(), reason = reason.as_str(),
                              "reply failed schema validation, failing over");
                        self.note_failover(index, &name, &reason).await;
                        last_reason = Some(reason);
                        continue;
                    }
                    return Ok(reply);
                }
                Err(CallError::Retryable(reason)) => {
                    warn!(provider = name.as_str(), reason = reason.as_str(),
                          "provider failed, entering cooldown");
                    self.mark_unhealthy(&name);
                    self.note_failover(index, &name, &reason).await;
                    last_reason = Some(reason);
                }
                Err(CallError::Fatal(reason)) => {
                    return Err(PotikError::provider(format!(
                        "provider {name} failed fatally: {reason}"
                    )));
                }
            }
        }

        let detail = match (attempted, last_reason) {
            (0, _) => "all providers in cooldown".to_string(),
            (_, Some(reason)) => format!("all providers exhausted, last error: {reason}"),
            (_, None) => "all providers exhausted".to_string(),
        };
        Err(PotikError::provider(detail))
    }

    fn in_cooldown(&self, name: &str) -> bool {
        let mut map = self.unhealthy_until.lock().expect("health mutex poisoned");
        match map.get(name) {
            Some(until) if *until > Instant::now() => true,
            Some(_) => {
                map.remove(name);
                false
            }
            None => false,
        }
    }

    fn mark_unhealthy(&self, name: &str) {
        let mut map = self.unhealthy_until.lock().expect("health mutex poisoned");
        map.insert(name.to_string(), Instant::now() + self.cooldown);
    }

    /// Counts the failover and records it in the graph, best effort.
    async fn note_failover(&self, from_index: usize, from: &str, reason: &str) {
        potik_metrics::record_failover(from);

        let to = self
            .providers
            .get(from_index + 1)
            .map(|p| p.name())
            .unwrap_or("none");
        info!(from, to, "switchboard failover");

        if let Some(graph) = &self.graph
            && let Err(e) = graph
                .log_system_event(
                    "FALLBACK",
                    from,
                    "warning",
                    &format!("Switched from {from} to {to}: {reason}"),
                )
                .await
        {
            warn!(error = %e, "failed to record failover in graph");
        }
    }
}
