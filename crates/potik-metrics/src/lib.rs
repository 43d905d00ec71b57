// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for the Potik pipeline.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Metrics are
//! rendered as Prometheus text format via the `render()` method. Recording
//! helpers in [`recording`] keep metric names and labels in one place; they
//! are no-ops until a recorder is installed, so library crates call them
//! unconditionally.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use potik_core::PotikError;

pub use recording::{
    record_failover, record_gate_verdict, record_persisted, record_plan_fallback,
    record_prompt_fallback, record_queue_shed, record_task_timeout, record_unpersisted,
    set_queue_depth,
};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder and exposes a handle for rendering
/// metrics in Prometheus text format.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Create a new PrometheusAdapter.
    ///
    /// Installs the Prometheus recorder globally. Only one recorder can be
    /// installed per process; a second install returns an error.
    pub fn new() -> Result<Self, PotikError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            PotikError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
