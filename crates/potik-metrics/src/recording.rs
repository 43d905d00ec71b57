// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics.

use metrics::{describe_counter, describe_gauge};

/// Register all Potik metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "potik_provider_failovers_total",
        "Provider failovers performed by the switchboard"
    );
    describe_counter!(
        "potik_messages_persisted_total",
        "Messages written to the graph by the Scribe"
    );
    describe_counter!(
        "potik_messages_unpersisted_total",
        "Messages dropped after exhausting graph write retries"
    );
    describe_counter!(
        "potik_queue_shed_total",
        "Payloads shed from a full stream-bus channel"
    );
    describe_counter!(
        "potik_gate_verdicts_total",
        "Gatekeeper verdicts by target"
    );
    describe_counter!(
        "potik_prompt_fallbacks_total",
        "Prompt assemblies served from static defaults"
    );
    describe_counter!(
        "potik_plan_fallbacks_total",
        "Analyst plans replaced by the apology fallback"
    );
    describe_counter!(
        "potik_task_timeouts_total",
        "Coordinator tasks that breached their soft deadline"
    );
    describe_gauge!(
        "potik_queue_depth",
        "Approximate occupancy of each stream-bus channel"
    );
}

/// Record one provider failover away from `provider`.
pub fn record_failover(provider: &str) {
    metrics::counter!("potik_provider_failovers_total", "provider" => provider.to_string())
        .increment(1);
}

/// Record one successfully persisted message.
pub fn record_persisted(source: &str) {
    metrics::counter!("potik_messages_persisted_total", "source" => source.to_string())
        .increment(1);
}

/// Record a message that could not be persisted after retries.
pub fn record_unpersisted() {
    metrics::counter!("potik_messages_unpersisted_total").increment(1);
}

/// Record a payload shed from a full channel.
pub fn record_queue_shed(channel: &str) {
    metrics::counter!("potik_queue_shed_total", "channel" => channel.to_string()).increment(1);
}

/// Record one gatekeeper verdict.
pub fn record_gate_verdict(target: &str) {
    metrics::counter!("potik_gate_verdicts_total", "target" => target.to_string()).increment(1);
}

/// Record a prompt assembly that fell back to static defaults.
pub fn record_prompt_fallback(role: &str) {
    metrics::counter!("potik_prompt_fallbacks_total", "role" => role.to_string()).increment(1);
}

/// Record a plan replaced by the apology fallback.
pub fn record_plan_fallback() {
    metrics::counter!("potik_plan_fallbacks_total").increment(1);
}

/// Record a plan task that timed out.
pub fn record_task_timeout(action: &str) {
    metrics::counter!("potik_task_timeouts_total", "action" => action.to_string()).increment(1);
}

/// Set the approximate depth of a channel.
pub fn set_queue_depth(channel: &str, depth: f64) {
    metrics::gauge!("potik_queue_depth", "channel" => channel.to_string()).set(depth);
}
