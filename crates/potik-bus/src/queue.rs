// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One named, bounded FIFO channel of the stream bus.
//!
//! Enqueue is `try_send` with exponential backoff (10ms doubling to a 1s
//! cap, jittered). Channels carrying best-effort payloads shed after a
//! bounded number of attempts; the ingestion channel blocks forever instead,
//! because raw events must never be dropped.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Initial backoff delay when a channel is full.
const BACKOFF_BASE: Duration = Duration::from_millis(10);

/// Backoff cap.
const BACKOFF_CAP: Duration = Duration::from_secs(1);

/// Behavior when the channel stays full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Keep backing off until space frees up. Used for `ingestion`.
    Block,
    /// Give up after this many full attempts and shed the payload.
    Shed { max_attempts: u32 },
}

/// Result of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The payload was dropped under backpressure (shedding policy).
    Shed,
}

/// Producer half of a named channel. Cheap to clone.
pub struct QueueSender<T> {
    name: &'static str,
    tx: mpsc::Sender<T>,
    policy: OverflowPolicy,
    capacity: usize,
}

// Manual impls: cloning a channel half never requires `T: Clone`.
impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
            policy: self.policy,
            capacity: self.capacity,
        }
    }
}

/// Consumer half of a named channel, shareable across a worker pool.
pub struct QueueReceiver<T> {
    name: &'static str,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            rx: Arc::clone(&self.rx),
        }
    }
}

/// Create a named bounded channel.
pub fn channel<T>(
    name: &'static str,
    capacity: usize,
    policy: OverflowPolicy,
) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        QueueSender {
            name,
            tx,
            policy,
            capacity: capacity.max(1),
        },
        QueueReceiver {
            name,
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

impl<T> QueueSender<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue with backoff. Returns `Shed` when the overflow policy gave up,
    /// `Err` only when the channel is closed.
    pub async fn send(&self, item: T) -> Result<SendOutcome, potik_core::PotikError> {
        let mut item = item;
        let mut delay = BACKOFF_BASE;
        let mut attempts: u32 = 0;

        loop {
            match self.tx.try_send(item) {
                Ok(()) => {
                    self.record_depth();
                    return Ok(SendOutcome::Delivered);
                }
                Err(TrySendError::Closed(_)) => {
                    return Err(potik_core::PotikError::Queue {
                        channel: self.name.to_string(),
                        message: "channel closed".to_string(),
                    });
                }
                Err(TrySendError::Full(returned)) => {
                    item = returned;
                    attempts += 1;

                    if let OverflowPolicy::Shed { max_attempts } = self.policy
                        && attempts >= max_attempts
                    {
                        warn!(channel = self.name, attempts, "shedding payload under backpressure");
                        potik_metrics::record_queue_shed(self.name);
                        return Ok(SendOutcome::Shed);
                    }

                    let jitter =
                        Duration::from_millis(rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 2));
                    tokio::time::sleep(delay + jitter).await;
                    delay = (delay * 2).min(BACKOFF_CAP);
                }
            }
        }
    }

    fn record_depth(&self) {
        let depth = self.capacity.saturating_sub(self.tx.capacity());
        potik_metrics::set_queue_depth(self.name, depth as f64);
    }
}

impl<T> QueueReceiver<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Receive the next payload, or `None` when all senders are gone.
    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Take the next payload only if one is already queued.
    pub async fn try_recv(&self) -> Option<T> {
        self.rx.lock().await.try_recv().ok()
    }

    /// Receive the next payload, returning `None` on cancellation or when
    /// the channel is closed. The shared receiver lock is itself acquired
    /// cancellably so draining workers never wedge behind a sibling.
    pub async fn recv_cancellable(&self, cancel: &CancellationToken) -> Option<T> {
        let mut rx = tokio::select! {
            _ = cancel.cancelled() => return None,
            guard = self.rx.lock() => guard,
        };
        tokio::select! {
            _ = cancel.cancelled() => None,
            item = rx.recv() => item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let (tx, rx) = channel::<u32>("test", 4, OverflowPolicy::Block);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn shed_policy_drops_when_full() {
        let (tx, _rx) = channel::<u32>("enrichment", 1, OverflowPolicy::Shed { max_attempts: 2 });
        assert_eq!(tx.send(1).await.unwrap(), SendOutcome::Delivered);
        // Channel full and never drained: the second send must shed quickly.
        assert_eq!(tx.send(2).await.unwrap(), SendOutcome::Shed);
    }

    #[tokio::test]
    async fn block_policy_waits_for_space() {
        let (tx, rx) = channel::<u32>("ingestion", 1, OverflowPolicy::Block);
        tx.send(1).await.unwrap();

        let tx2 = tx.clone();
        let sender = tokio::spawn(async move { tx2.send(2).await });

        // Drain one slot; the blocked send must then complete.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(sender.await.unwrap().unwrap(), SendOutcome::Delivered);
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn closed_channel_errors() {
        let (tx, rx) = channel::<u32>("test", 1, OverflowPolicy::Block);
        drop(rx);
        // The receiver Arc is gone, so the mpsc receiver is dropped.
        assert!(tx.send(1).await.is_err());
    }

    #[tokio::test]
    async fn recv_cancellable_returns_none_on_cancel() {
        let (_tx, rx) = channel::<u32>("test", 1, OverflowPolicy::Block);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(rx.recv_cancellable(&cancel).await, None);
    }

    #[tokio::test]
    async fn shared_receiver_feeds_multiple_workers() {
        let (tx, rx) = channel::<u32>("test", 8, OverflowPolicy::Block);
        for i in 0..4 {
            tx.send(i).await.unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..4 {
            let rx = rx.clone();
            seen.push(tokio::spawn(async move { rx.recv().await }));
        }
        let mut got: Vec<u32> = Vec::new();
        for handle in seen {
            got.push(handle.await.unwrap().unwrap());
        }
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3]);
    }
}
