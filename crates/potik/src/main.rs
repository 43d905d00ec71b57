// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Potik — a Telegram-observing AI agent built as a cognitive stream
//! pipeline over a knowledge graph.
//!
//! This is the binary entry point. Exit codes: 0 success, 2 configuration
//! error, 3 graph unreachable, 4 no providers available.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod backfill;
mod ping;
mod serve;
mod transport;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use potik_config::{load_config, load_config_from_path, validate_config, PotikConfig};
use potik_core::PotikError;

/// Potik — an always-on chat observer and assistant.
#[derive(Parser, Debug)]
#[command(name = "potik", version, about, long_about = None)]
struct Cli {
    /// Explicit config file path (skips the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start all streams of the pipeline.
    Serve,
    /// Reprocess recently persisted messages through the Thinker.
    Backfill {
        /// How many of the most recent messages to reprocess.
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Round-trip health check against both logical graphs.
    GraphPing,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        }
    };

    init_tracing(&config.agent.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run(config).await,
        Commands::Backfill { limit } => backfill::run(config, limit).await,
        Commands::GraphPing => ping::run(config).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(exit_code(&e));
    }
}

fn load(cli: &Cli) -> Result<PotikConfig, String> {
    let config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    }
    .map_err(|e| e.to_string())?;

    validate_config(&config).map_err(|errors| errors.join("; "))?;
    Ok(config)
}

/// Maps error kinds to the documented operational exit codes.
fn exit_code(error: &PotikError) -> i32 {
    match error {
        PotikError::Config(_) => 2,
        PotikError::Graph { .. } => 3,
        PotikError::Provider { .. } => 4,
        _ => 1,
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("potik={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_contract() {
        assert_eq!(exit_code(&PotikError::Config("x".into())), 2);
        assert_eq!(exit_code(&PotikError::graph("down")), 3);
        assert_eq!(exit_code(&PotikError::provider("none")), 4);
        assert_eq!(exit_code(&PotikError::Internal("x".into())), 1);
    }

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Verify jemalloc is the global allocator by advancing the epoch.
        // Only jemalloc supports this -- the system allocator would fail.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }
}
