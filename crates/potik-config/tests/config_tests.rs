// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Potik configuration system.

use potik_config::model::PotikConfig;
use potik_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_potik_config() {
    let toml = r#"
[agent]
telegram_id = 8521381973
name = "Бобер"
log_level = "debug"

[graph]
host = "graph.internal"
port = 6380
primary_name = "PrimaryMemory"
thoughtlog_name = "ThoughtLog"

[providers]
order = ["openai_compatible", "cli_gemini"]
cooldown_seconds = 45

[providers.cli]
command = "gemini"
args = ["--sandbox"]
model = "gemini-2.5-flash"
timeout_seconds = 90

[providers.openai]
base_url = "http://localhost:11434/v1"
model = "gemma3:4b"

[streams.scribe]
workers = 1
queue_capacity = 512

[streams.thinker]
workers = 4
queue_capacity = 64

[gatekeeper]
model = "gemma3:4b"

[thinker]
history_k = 7

[coordinator]
task_timeout_seconds = 15

[prompt]
cache_ttl_seconds = 120
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.telegram_id, 8_521_381_973);
    assert_eq!(config.agent.name, "Бобер");
    assert_eq!(config.agent.log_level, "debug");
    assert_eq!(config.graph.host, "graph.internal");
    assert_eq!(config.graph.port, 6380);
    assert_eq!(config.graph.url(), "redis://graph.internal:6380/");
    assert_eq!(config.providers.order, vec!["openai_compatible", "cli_gemini"]);
    assert_eq!(config.providers.cooldown_seconds, 45);
    assert_eq!(config.providers.cli.args, vec!["--sandbox"]);
    assert_eq!(config.providers.openai.base_url, "http://localhost:11434/v1");
    assert_eq!(config.streams.scribe.queue_capacity, 512);
    assert_eq!(config.streams.thinker.workers, 4);
    assert_eq!(config.gatekeeper.model, "gemma3:4b");
    assert_eq!(config.thinker.history_k, 7);
    assert_eq!(config.coordinator.task_timeout_seconds, 15);
    assert_eq!(config.prompt.cache_ttl_seconds, 120);
}

/// Unknown field in a section produces an error instead of silent acceptance.
#[test]
fn unknown_field_in_graph_produces_error() {
    let toml = r#"
[graph]
hots = "typo"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("hots"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.agent.name, "potik");
    assert_eq!(config.agent.log_level, "info");
    assert_eq!(config.graph.host, "127.0.0.1");
    assert_eq!(config.graph.port, 6379);
    assert_eq!(config.graph.primary_name, "PrimaryMemory");
    assert_eq!(config.graph.thoughtlog_name, "ThoughtLog");
    assert_eq!(config.providers.order, vec!["cli_gemini", "openai_compatible"]);
    assert_eq!(config.providers.cooldown_seconds, 30);
    assert_eq!(config.streams.scribe.workers, 1);
    assert_eq!(config.streams.gatekeeper.workers, 2);
    assert_eq!(config.streams.thinker.workers, 2);
    assert_eq!(config.streams.analyst.workers, 2);
    assert_eq!(config.streams.coordinator.workers, 8);
    assert_eq!(config.streams.responder.workers, 2);
    assert_eq!(config.streams.scribe.queue_capacity, 256);
    assert_eq!(config.thinker.history_k, 5);
    assert_eq!(config.coordinator.task_timeout_seconds, 30);
    assert_eq!(config.prompt.cache_ttl_seconds, 60);
}

/// Environment variable POTIK_AGENT_NAME overrides agent.name in TOML.
#[test]
fn env_var_overrides_agent_name() {
    // Drive the Figment directly so the env var is scoped to this test.
    use figment::{
        providers::{Env, Format, Serialized, Toml},
        Figment, Jail,
    };

    Jail::expect_with(|jail| {
        jail.set_env("POTIK_AGENT_NAME", "env-agent");
        jail.set_env("POTIK_GRAPH_PRIMARY_NAME", "EnvMemory");
        jail.set_env("POTIK_STREAMS_THINKER_WORKERS", "9");

        let config: PotikConfig = Figment::new()
            .merge(Serialized::defaults(PotikConfig::default()))
            .merge(Toml::string("[agent]\nname = \"toml-agent\""))
            .merge(Env::prefixed("POTIK_").map(|key| {
                let mapped = key
                    .as_str()
                    .replacen("streams_thinker_", "streams.thinker.", 1)
                    .replacen("agent_", "agent.", 1)
                    .replacen("graph_", "graph.", 1);
                mapped.into()
            }))
            .extract()?;

        assert_eq!(config.agent.name, "env-agent");
        assert_eq!(config.graph.primary_name, "EnvMemory");
        assert_eq!(config.streams.thinker.workers, 9);
        Ok(())
    });
}

/// load_and_validate_str surfaces semantic errors.
#[test]
fn validation_errors_surface_through_load_and_validate() {
    let toml = r#"
[providers]
order = ["not_a_provider"]
"#;
    let err = load_and_validate_str(toml).expect_err("unknown provider should fail validation");
    assert!(format!("{err}").contains("not_a_provider"));
}

/// A partial stream section fills missing fields from defaults.
#[test]
fn partial_stream_section_uses_field_defaults() {
    let toml = r#"
[streams.thinker]
workers = 4
"#;
    let config = load_config_from_str(toml).expect("partial section should deserialize");
    assert_eq!(config.streams.thinker.workers, 4);
    assert_eq!(config.streams.thinker.queue_capacity, 256);
    // Untouched sections keep their stream-specific defaults.
    assert_eq!(config.streams.coordinator.workers, 8);
}

/// Two scribe workers are rejected at validation time.
#[test]
fn scribe_worker_count_is_enforced() {
    let toml = r#"
[streams.scribe]
workers = 3
queue_capacity = 256
"#;
    let err = load_and_validate_str(toml).expect_err("multi-worker scribe should fail");
    assert!(format!("{err}").contains("per-chat write order"));
}
