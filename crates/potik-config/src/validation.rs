// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as known provider names and positive worker counts.

use crate::model::{PotikConfig, StreamConfig};

/// Provider names the switchboard knows how to construct.
pub const KNOWN_PROVIDERS: &[&str] = &["cli_gemini", "openai_compatible"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<String>)` with all
/// collected validation errors (does not fail fast).
pub fn validate_config(config: &PotikConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.providers.order.is_empty() {
        errors.push("providers.order must list at least one provider".to_string());
    }

    for name in &config.providers.order {
        if !KNOWN_PROVIDERS.contains(&name.as_str()) {
            errors.push(format!(
                "providers.order contains unknown provider `{name}` (known: {})",
                KNOWN_PROVIDERS.join(", ")
            ));
        }
    }

    if config.providers.cooldown_seconds == 0 {
        errors.push("providers.cooldown_seconds must be positive".to_string());
    }

    if config.graph.host.trim().is_empty() {
        errors.push("graph.host must not be empty".to_string());
    }

    if config.graph.primary_name.trim().is_empty() {
        errors.push("graph.primary_name must not be empty".to_string());
    }

    if config.graph.thoughtlog_name.trim().is_empty() {
        errors.push("graph.thoughtlog_name must not be empty".to_string());
    }

    if config.graph.primary_name == config.graph.thoughtlog_name {
        errors.push(
            "graph.primary_name and graph.thoughtlog_name must be distinct logical graphs"
                .to_string(),
        );
    }

    let streams: [(&str, &StreamConfig); 6] = [
        ("scribe", &config.streams.scribe),
        ("gatekeeper", &config.streams.gatekeeper),
        ("thinker", &config.streams.thinker),
        ("analyst", &config.streams.analyst),
        ("coordinator", &config.streams.coordinator),
        ("responder", &config.streams.responder),
    ];
    for (name, stream) in streams {
        if stream.workers == 0 {
            errors.push(format!("streams.{name}.workers must be positive"));
        }
        if stream.queue_capacity == 0 {
            errors.push(format!("streams.{name}.queue_capacity must be positive"));
        }
    }

    // A multi-writer Scribe would race the per-chat LAST_EVENT repoint.
    if config.streams.scribe.workers > 1 {
        errors.push("streams.scribe.workers must be 1 to preserve per-chat write order".to_string());
    }

    if config.thinker.history_k == 0 {
        errors.push("thinker.history_k must be positive".to_string());
    }

    if config.coordinator.task_timeout_seconds == 0 {
        errors.push("coordinator.task_timeout_seconds must be positive".to_string());
    }

    if config.agent.name.trim().is_empty() {
        errors.push("agent.name must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = PotikConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_provider_order_fails() {
        let mut config = PotikConfig::default();
        config.providers.order.clear();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("providers.order")));
    }

    #[test]
    fn unknown_provider_name_fails() {
        let mut config = PotikConfig::default();
        config.providers.order = vec!["ollama_raw".to_string()];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("ollama_raw")));
    }

    #[test]
    fn multi_worker_scribe_fails() {
        let mut config = PotikConfig::default();
        config.streams.scribe.workers = 2;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("scribe.workers")));
    }

    #[test]
    fn identical_graph_names_fail() {
        let mut config = PotikConfig::default();
        config.graph.thoughtlog_name = config.graph.primary_name.clone();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("distinct")));
    }

    #[test]
    fn zero_queue_capacity_fails() {
        let mut config = PotikConfig::default();
        config.streams.analyst.queue_capacity = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("analyst.queue_capacity")));
    }
}
