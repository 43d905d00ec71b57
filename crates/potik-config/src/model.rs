// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Potik pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Potik configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PotikConfig {
    /// Process-wide agent identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Graph store endpoint and logical graph names.
    #[serde(default)]
    pub graph: GraphConfig,

    /// LLM provider ordering, cooldown, and per-provider settings.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Per-stream worker counts and queue capacities.
    #[serde(default)]
    pub streams: StreamsConfig,

    /// Gatekeeper triage settings.
    #[serde(default)]
    pub gatekeeper: GatekeeperConfig,

    /// Thinker context settings.
    #[serde(default)]
    pub thinker: ThinkerConfig,

    /// Coordinator execution settings.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Prompt assembler settings.
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Process-wide agent identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Telegram identity of the agent; events from this id are persisted
    /// with the GENERATED edge instead of AUTHORED.
    #[serde(default)]
    pub telegram_id: i64,

    /// Display name of the agent. Mentions of this name force a DIRECT
    /// gatekeeper verdict.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            telegram_id: 0,
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "potik".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Graph store endpoint and logical graph names.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    #[serde(default = "default_graph_host")]
    pub host: String,

    #[serde(default = "default_graph_port")]
    pub port: u16,

    /// Graph holding observational facts and semantic enrichment.
    #[serde(default = "default_primary_name")]
    pub primary_name: String,

    /// Graph holding reasoning-process records, isolated from analytics.
    #[serde(default = "default_thoughtlog_name")]
    pub thoughtlog_name: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            host: default_graph_host(),
            port: default_graph_port(),
            primary_name: default_primary_name(),
            thoughtlog_name: default_thoughtlog_name(),
        }
    }
}

impl GraphConfig {
    /// Redis connection URL for the graph endpoint.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

fn default_graph_host() -> String {
    "127.0.0.1".to_string()
}

fn default_graph_port() -> u16 {
    6379
}

fn default_primary_name() -> String {
    "PrimaryMemory".to_string()
}

fn default_thoughtlog_name() -> String {
    "ThoughtLog".to_string()
}

/// LLM provider ordering, cooldown, and per-provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Ordered list of providers to try. Known names: `cli_gemini`,
    /// `openai_compatible`.
    #[serde(default = "default_provider_order")]
    pub order: Vec<String>,

    /// Seconds an unhealthy provider is skipped before being retried.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// CLI-spawning provider settings.
    #[serde(default)]
    pub cli: CliProviderConfig,

    /// OpenAI-compatible HTTP provider settings.
    #[serde(default)]
    pub openai: OpenAiProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            order: default_provider_order(),
            cooldown_seconds: default_cooldown_seconds(),
            cli: CliProviderConfig::default(),
            openai: OpenAiProviderConfig::default(),
        }
    }
}

fn default_provider_order() -> Vec<String> {
    vec!["cli_gemini".to_string(), "openai_compatible".to_string()]
}

fn default_cooldown_seconds() -> u64 {
    30
}

/// Settings for the CLI-spawning provider: prompt on stdin, completion on
/// stdout, non-zero exit treated as retryable.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CliProviderConfig {
    #[serde(default = "default_cli_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_cli_model")]
    pub model: String,

    /// Hard deadline for one spawned completion.
    #[serde(default = "default_cli_timeout")]
    pub timeout_seconds: u64,
}

impl Default for CliProviderConfig {
    fn default() -> Self {
        Self {
            command: default_cli_command(),
            args: Vec::new(),
            model: default_cli_model(),
            timeout_seconds: default_cli_timeout(),
        }
    }
}

fn default_cli_command() -> String {
    "gemini".to_string()
}

fn default_cli_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_cli_timeout() -> u64 {
    120
}

/// Settings for the OpenAI-compatible chat-completions provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiProviderConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// API key. `None` sends no Authorization header (local endpoints).
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub model: String,
}

impl Default for OpenAiProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key: None,
            model: default_openai_model(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Worker count and queue capacity for one stream.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    /// Partial sections default conservatively to a single worker.
    #[serde(default = "default_stream_workers")]
    pub workers: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl StreamConfig {
    const fn new(workers: usize) -> Self {
        Self {
            workers,
            queue_capacity: 256,
        }
    }
}

fn default_stream_workers() -> usize {
    1
}

fn default_queue_capacity() -> usize {
    256
}

/// Per-stream worker counts and bounded queue capacities.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamsConfig {
    #[serde(default = "default_scribe")]
    pub scribe: StreamConfig,
    #[serde(default = "default_gatekeeper_stream")]
    pub gatekeeper: StreamConfig,
    #[serde(default = "default_thinker_stream")]
    pub thinker: StreamConfig,
    #[serde(default = "default_analyst")]
    pub analyst: StreamConfig,
    #[serde(default = "default_coordinator_stream")]
    pub coordinator: StreamConfig,
    #[serde(default = "default_responder")]
    pub responder: StreamConfig,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            scribe: default_scribe(),
            gatekeeper: default_gatekeeper_stream(),
            thinker: default_thinker_stream(),
            analyst: default_analyst(),
            coordinator: default_coordinator_stream(),
            responder: default_responder(),
        }
    }
}

// Per-chat ordering requires a single Scribe writer.
fn default_scribe() -> StreamConfig {
    StreamConfig::new(1)
}

fn default_gatekeeper_stream() -> StreamConfig {
    StreamConfig::new(2)
}

fn default_thinker_stream() -> StreamConfig {
    StreamConfig::new(2)
}

fn default_analyst() -> StreamConfig {
    StreamConfig::new(2)
}

fn default_coordinator_stream() -> StreamConfig {
    StreamConfig::new(8)
}

fn default_responder() -> StreamConfig {
    StreamConfig::new(2)
}

/// Gatekeeper triage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatekeeperConfig {
    /// Identifier of the cheap classification model, passed to the provider
    /// as a per-call override.
    #[serde(default = "default_gatekeeper_model")]
    pub model: String,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            model: default_gatekeeper_model(),
        }
    }
}

fn default_gatekeeper_model() -> String {
    "gemma3:4b".to_string()
}

/// Thinker context settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThinkerConfig {
    /// Number of prior messages from the same chat included as context.
    #[serde(default = "default_history_k")]
    pub history_k: usize,
}

impl Default for ThinkerConfig {
    fn default() -> Self {
        Self {
            history_k: default_history_k(),
        }
    }
}

fn default_history_k() -> usize {
    5
}

/// Coordinator execution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Soft deadline per plan task; a breach marks the task timed out
    /// without failing the plan.
    #[serde(default = "default_task_timeout")]
    pub task_timeout_seconds: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            task_timeout_seconds: default_task_timeout(),
        }
    }
}

fn default_task_timeout() -> u64 {
    30
}

/// Prompt assembler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PromptConfig {
    /// TTL of the assembled-prompt cache, keyed by (role, task).
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    60
}
