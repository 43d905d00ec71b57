// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `potik graph-ping` command implementation.

use potik_config::PotikConfig;
use potik_core::PotikError;
use potik_graph::{FalkorStore, GraphClient, GraphStore};

/// Round-trips `RETURN 1` against both logical graphs.
pub async fn run(config: PotikConfig) -> Result<(), PotikError> {
    let client = GraphClient::connect(&config.graph.url()).await?;
    let store = FalkorStore::new(
        client,
        config.graph.primary_name.clone(),
        config.graph.thoughtlog_name.clone(),
        config.agent.telegram_id,
        config.agent.name.clone(),
    );
    store.ping().await?;

    println!(
        "graph ok: {} and {} at {}",
        config.graph.primary_name,
        config.graph.thoughtlog_name,
        config.graph.url()
    );
    Ok(())
}
