// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded in-memory stream bus between pipeline stages.
//!
//! Push-based dataflow: each stage is a worker pool consuming one channel
//! and publishing to one or more downstream channels. Producers back off
//! exponentially when a channel is full; best-effort channels shed, the
//! ingestion channel never does.

pub mod bus;
pub mod queue;

pub use bus::{Channel, StreamBus};
pub use queue::{channel, OverflowPolicy, QueueReceiver, QueueSender, SendOutcome};
