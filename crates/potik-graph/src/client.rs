// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level graph client speaking `GRAPH.QUERY` over the Redis protocol.
//!
//! One multiplexed connection is shared by all workers; redis multiplexing
//! makes the handle cheap to clone. Retry with jittered exponential backoff
//! is offered as [`GraphClient::query_with_retry`] for write paths that must
//! survive transient store hiccups.

use std::time::Duration;

use potik_core::PotikError;
use rand::Rng;
use redis::aio::MultiplexedConnection;
use tracing::{debug, warn};

use crate::value::{parse_reply, GraphReply};

/// Maximum retry attempts for [`GraphClient::query_with_retry`].
const MAX_RETRIES: u32 = 5;

/// Base delay for the retry backoff; doubles per attempt with jitter.
const RETRY_BASE: Duration = Duration::from_millis(100);

/// Client for a FalkorDB-style graph module endpoint.
#[derive(Clone)]
pub struct GraphClient {
    conn: MultiplexedConnection,
}

impl GraphClient {
    /// Connects to the graph endpoint at `url` (e.g. `redis://127.0.0.1:6379/`).
    pub async fn connect(url: &str) -> Result<Self, PotikError> {
        let client = redis::Client::open(url).map_err(|e| PotikError::Graph {
            message: format!("invalid graph endpoint url `{url}`"),
            source: Some(Box::new(e)),
        })?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PotikError::Graph {
                message: format!("failed to connect to graph endpoint `{url}`"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { conn })
    }

    /// Round-trip health check against the server itself.
    pub async fn ping(&self) -> Result<(), PotikError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| PotikError::Graph {
                message: "graph endpoint did not answer PING".to_string(),
                source: Some(Box::new(e)),
            })
    }

    /// Executes one Cypher statement against the named graph.
    pub async fn query(&self, graph: &str, cypher: &str) -> Result<GraphReply, PotikError> {
        let mut conn = self.conn.clone();
        let value = redis::cmd("GRAPH.QUERY")
            .arg(graph)
            .arg(cypher)
            .query_async::<redis::Value>(&mut conn)
            .await
            .map_err(|e| PotikError::Graph {
                message: format!("GRAPH.QUERY failed on `{graph}`: {e}"),
                source: Some(Box::new(e)),
            })?;
        parse_reply(value)
    }

    /// Executes one read-only Cypher statement via `GRAPH.RO_QUERY`, letting
    /// the server reject writes the validator missed.
    pub async fn ro_query(&self, graph: &str, cypher: &str) -> Result<GraphReply, PotikError> {
        let mut conn = self.conn.clone();
        let value = redis::cmd("GRAPH.RO_QUERY")
            .arg(graph)
            .arg(cypher)
            .query_async::<redis::Value>(&mut conn)
            .await
            .map_err(|e| PotikError::Graph {
                message: format!("GRAPH.RO_QUERY failed on `{graph}`: {e}"),
                source: Some(Box::new(e)),
            })?;
        parse_reply(value)
    }

    /// Like [`query`](Self::query) but retried up to 5 times with jittered
    /// exponential backoff. Used by the Scribe's persist path.
    pub async fn query_with_retry(
        &self,
        graph: &str,
        cypher: &str,
    ) -> Result<GraphReply, PotikError> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let backoff = RETRY_BASE * 2u32.pow(attempt - 1);
                let jitter = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 2);
                let delay = backoff + Duration::from_millis(jitter);
                debug!(attempt, ?delay, "retrying graph query after transient error");
                tokio::time::sleep(delay).await;
            }

            match self.query(graph, cypher).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    warn!(attempt, error = %e, "graph query attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PotikError::graph("graph query failed after retries")))
    }

    /// Creates a unique-node constraint, tolerating "already exists" replies.
    pub async fn ensure_unique_constraint(
        &self,
        graph: &str,
        label: &str,
        property: &str,
    ) -> Result<(), PotikError> {
        let mut conn = self.conn.clone();
        let result = redis::cmd("GRAPH.CONSTRAINT")
            .arg("CREATE")
            .arg(graph)
            .arg("UNIQUE")
            .arg("NODE")
            .arg(label)
            .arg("PROPERTIES")
            .arg(1)
            .arg(property)
            .query_async::<redis::Value>(&mut conn)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("already exists") => {
                debug!(label, property, "constraint already present");
                Ok(())
            }
            // Constraint support varies by server build; a missing command
            // must not block startup.
            Err(e) => {
                debug!(label, property, error = %e, "constraint creation skipped");
                Ok(())
            }
        }
    }
}
