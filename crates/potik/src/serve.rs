// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `potik serve` command implementation.
//!
//! Connects the graph store, builds the provider switchboard and the prompt
//! assembler (seeding the prompt subgraph on first boot), wires the five
//! streams, and runs until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use potik_config::PotikConfig;
use potik_core::PotikError;
use potik_graph::{FalkorStore, GraphClient, GraphStore};
use potik_metrics::PrometheusAdapter;
use potik_prompt::PromptAssembler;
use potik_streams::Pipeline;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::LogTransport;

/// Runs the `potik serve` command.
pub async fn run(config: PotikConfig) -> Result<(), PotikError> {
    info!("starting potik serve");

    // Metrics are best effort: a second recorder (tests, embedding) must
    // not prevent startup.
    let _metrics = match PrometheusAdapter::new() {
        Ok(adapter) => Some(adapter),
        Err(e) => {
            warn!(error = %e, "metrics recorder unavailable, continuing without");
            None
        }
    };

    // Graph store: unreachable at startup is fatal (exit 3).
    let client = GraphClient::connect(&config.graph.url()).await?;
    let store: Arc<dyn GraphStore> = Arc::new(FalkorStore::new(
        client,
        config.graph.primary_name.clone(),
        config.graph.thoughtlog_name.clone(),
        config.agent.telegram_id,
        config.agent.name.clone(),
    ));
    store.ping().await?;
    store.ensure_schema().await?;
    info!(
        primary = config.graph.primary_name.as_str(),
        thoughtlog = config.graph.thoughtlog_name.as_str(),
        "graph store connected"
    );

    // Provider switchboard, with failovers recorded into the graph.
    let switchboard = Arc::new(
        potik_switchboard::build_switchboard(&config.providers)?.with_graph_logger(store.clone()),
    );
    info!(providers = ?switchboard.provider_names(), "switchboard ready");

    // Prompt assembler; seed the subgraph at first boot so the graph is
    // authoritative from then on.
    let assembler = Arc::new(PromptAssembler::new(
        store.clone(),
        Duration::from_secs(config.prompt.cache_ttl_seconds),
    ));
    if store.prompt_graph_is_empty().await? {
        info!("prompt subgraph is empty, seeding defaults");
        store.seed_prompt_graph(&potik_prompt::seeds()).await?;
        assembler.invalidate();
    } else {
        debug!("prompt subgraph already populated");
    }

    let transport = Arc::new(LogTransport::new());

    let cancel = install_signal_handler();
    let pipeline = Pipeline::spawn(
        &config,
        store,
        switchboard,
        assembler,
        transport,
        cancel.clone(),
    );
    info!("all streams running");

    cancel.cancelled().await;
    info!("draining stream workers");
    pipeline.join().await;

    info!("potik serve shutdown complete");
    Ok(())
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is
/// received.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}
