//! InMemoryBroker - process-local broker for development and tests.
//!
//! - Mutex + Condvar for the blocking pop
//! - `spawn_blocking` to keep the blocking wait off the async workers
//! - one `VecDeque` per queue name, plus an in-flight list until `ack`

use crate::ports::{Broker, BrokerError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Queues {
    waiting: HashMap<String, VecDeque<String>>,
    in_flight: HashMap<String, Vec<String>>,
}

/// Selected with a `memory://` broker url.
///
/// # Usage
/// ```ignore
/// let broker = InMemoryBroker::new();
/// broker.push("backrun", payload).await?;
/// let entry = broker.pop("backrun", Duration::from_secs(5)).await?;
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    queues: Arc<Mutex<Queues>>,
    /// Signalled on every push.
    condvar: Arc<Condvar>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(Mutex::new(Queues::default())),
            condvar: Arc::new(Condvar::new()),
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(queues: &Mutex<Queues>) -> Result<MutexGuard<'_, Queues>, BrokerError> {
    queues
        .lock()
        .map_err(|e| BrokerError::OperationFailed(format!("queue lock poisoned: {e}")))
}

#[async_trait::async_trait]
impl Broker for InMemoryBroker {
    async fn push(&self, queue: &str, payload: String) -> Result<(), BrokerError> {
        let queues = self.queues.clone();
        let condvar = self.condvar.clone();
        let queue = queue.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), BrokerError> {
            let mut guard = lock(&queues)?;
            guard.waiting.entry(queue).or_default().push_back(payload);
            // waiters may be parked on different queues
            condvar.notify_all();
            Ok(())
        })
        .await
        .map_err(|e| BrokerError::OperationFailed(format!("push failed: {e}")))?
    }

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, BrokerError> {
        let queues = self.queues.clone();
        let condvar = self.condvar.clone();
        let queue = queue.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<String>, BrokerError> {
            let start = Instant::now();
            let mut guard = lock(&queues)?;
            loop {
                if let Some(entries) = guard.waiting.get_mut(&queue)
                    && let Some(payload) = entries.pop_front()
                {
                    guard
                        .in_flight
                        .entry(queue.clone())
                        .or_default()
                        .push(payload.clone());
                    return Ok(Some(payload));
                }

                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    return Ok(None);
                }
                let (new_guard, _) = condvar
                    .wait_timeout(guard, timeout - elapsed)
                    .map_err(|e| BrokerError::OperationFailed(format!("queue lock poisoned: {e}")))?;
                guard = new_guard;
            }
        })
        .await
        .map_err(|e| BrokerError::OperationFailed(format!("pop failed: {e}")))?
    }

    async fn ack(&self, queue: &str, payload: &str) -> Result<(), BrokerError> {
        let mut guard = lock(&self.queues)?;
        let removed = guard.in_flight.get_mut(queue).and_then(|entries| {
            let index = entries.iter().position(|p| p == payload)?;
            Some(entries.remove(index))
        });
        if removed.is_none() {
            tracing::warn!(queue, "acked entry was not in flight");
        }
        Ok(())
    }

    async fn depth(&self, queue: &str) -> Result<usize, BrokerError> {
        let guard = lock(&self.queues)?;
        Ok(guard.waiting.get(queue).map_or(0, VecDeque::len))
    }

    async fn in_flight(&self, queue: &str) -> Result<usize, BrokerError> {
        let guard = lock(&self.queues)?;
        Ok(guard.in_flight.get(queue).map_or(0, Vec::len))
    }

    async fn requeue_in_flight(&self, queue: &str) -> Result<usize, BrokerError> {
        let mut guard = lock(&self.queues)?;
        let entries = guard.in_flight.remove(queue).unwrap_or_default();
        let moved = entries.len();
        guard.waiting.entry(queue.to_string()).or_default().extend(entries);
        drop(guard);
        if moved > 0 {
            self.condvar.notify_all();
        }
        Ok(moved)
    }
}
