//! Broker port - durable queue service (Redis, or in-memory for development).
//!
//! The broker carries encoded `JobEnvelope`s and nothing else. FIFO per queue
//! and delivery guarantees are the broker's contract.
//!
//! A popped entry is not deleted: it moves to the queue's in-flight list
//! until the consumer `ack`s it. Entries left in flight by a crashed consumer
//! can be put back with `requeue_in_flight`.

use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    ConnectionFailed(String),

    #[error("redis operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("broker operation failed: {0}")]
    OperationFailed(String),
}

/// Push/pop of opaque payloads on named queues.
///
/// Handles are created once at startup and shared; implementations must be
/// safe for concurrent pushes.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn push(&self, queue: &str, payload: String) -> Result<(), BrokerError>;

    /// Blocking pop into the in-flight list. `Ok(None)` when nothing arrived
    /// within `timeout`.
    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, BrokerError>;

    /// Remove a popped entry from the in-flight list.
    async fn ack(&self, queue: &str, payload: &str) -> Result<(), BrokerError>;

    /// Number of entries waiting in `queue`.
    async fn depth(&self, queue: &str) -> Result<usize, BrokerError>;

    /// Number of entries popped from `queue` but not acked yet.
    async fn in_flight(&self, queue: &str) -> Result<usize, BrokerError>;

    /// Move every in-flight entry of `queue` back onto it. Returns how many
    /// moved. Only safe while no consumer is working `queue`.
    async fn requeue_in_flight(&self, queue: &str) -> Result<usize, BrokerError>;
}

/// Key of the in-flight list that belongs to `queue`.
pub fn in_flight_key(queue: &str) -> String {
    format!("{queue}:processing")
}
