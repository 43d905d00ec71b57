// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Potik pipeline.
//!
//! Mock provider with scripted outcomes, mock transport recording sends,
//! and an in-memory `GraphStore` so the full pipeline runs in CI without a
//! graph server or LLM endpoint.

pub mod memory_graph;
pub mod mock_provider;
pub mod mock_transport;

pub use memory_graph::{MemoryGraph, MemoryMessage};
pub use mock_provider::MockProvider;
pub use mock_transport::MockTransport;
