// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM provider switchboard for the Potik pipeline.
//!
//! Two concrete providers (CLI-spawning and OpenAI-compatible HTTP) behind
//! the `LlmProvider` seam, routed by an ordered failover switchboard with
//! cooldown-based health tracking.

pub mod cli;
pub mod openai;
pub mod switchboard;

use std::sync::Arc;
use std::time::Duration;

use potik_config::model::ProvidersConfig;
use potik_core::traits::LlmProvider;
use potik_core::PotikError;

pub use cli::CliProvider;
pub use openai::OpenAiProvider;
pub use switchboard::Switchboard;

/// Build the switchboard from configuration, instantiating providers in the
/// configured order. Unknown names were already rejected by config
/// validation; they error here too so direct construction stays safe.
pub fn build_switchboard(config: &ProvidersConfig) -> Result<Switchboard, PotikError> {
    let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::with_capacity(config.order.len());

    for name in &config.order {
        match name.as_str() {
            "cli_gemini" => {
                providers.push(Arc::new(CliProvider::new("cli_gemini", config.cli.clone())));
            }
            "openai_compatible" => {
                providers.push(Arc::new(OpenAiProvider::new(
                    "openai_compatible",
                    config.openai.clone(),
                )?));
            }
            other => {
                return Err(PotikError::Config(format!(
                    "unknown provider `{other}` in providers.order"
                )));
            }
        }
    }

    Ok(Switchboard::new(
        providers,
        Duration::from_secs(config.cooldown_seconds),
    ))
}
