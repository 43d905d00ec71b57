// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./potik.toml` > `~/.config/potik/potik.toml` >
//! `/etc/potik/potik.toml` with environment variable overrides via the
//! `POTIK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PotikConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/potik/potik.toml` (system-wide)
/// 3. `~/.config/potik/potik.toml` (user XDG config)
/// 4. `./potik.toml` (local directory)
/// 5. `POTIK_*` environment variables
pub fn load_config() -> Result<PotikConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PotikConfig::default()))
        .merge(Toml::file("/etc/potik/potik.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("potik/potik.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("potik.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<PotikConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PotikConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PotikConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PotikConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `POTIK_GRAPH_PRIMARY_NAME` must map to
/// `graph.primary_name`, not `graph.primary.name`. Stream sections nest one
/// level deeper (`POTIK_STREAMS_SCRIBE_WORKERS` -> `streams.scribe.workers`).
fn env_provider() -> Env {
    Env::prefixed("POTIK_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("streams_scribe_", "streams.scribe.", 1)
            .replacen("streams_gatekeeper_", "streams.gatekeeper.", 1)
            .replacen("streams_thinker_", "streams.thinker.", 1)
            .replacen("streams_analyst_", "streams.analyst.", 1)
            .replacen("streams_coordinator_", "streams.coordinator.", 1)
            .replacen("streams_responder_", "streams.responder.", 1)
            .replacen("providers_cli_", "providers.cli.", 1)
            .replacen("providers_openai_", "providers.openai.", 1)
            .replacen("agent_", "agent.", 1)
            .replacen("graph_", "graph.", 1)
            .replacen("providers_", "providers.", 1)
            .replacen("gatekeeper_", "gatekeeper.", 1)
            .replacen("thinker_", "thinker.", 1)
            .replacen("coordinator_", "coordinator.", 1)
            .replacen("prompt_", "prompt.", 1);
        mapped.into()
    })
}
