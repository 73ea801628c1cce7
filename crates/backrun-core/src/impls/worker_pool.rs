//! WorkerPool - in-process executor behind `InProcessStrategy`.
//!
//! - `BinaryHeap` ordered by (priority, submission order)
//! - `Notify` wakes idle workers on submit
//! - `watch` channel for shutdown, as in the broker `WorkerGroup`
//! - each job runs in its own task so a panic cannot take a worker down

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::domain::{JobArgs, JobId, Priority, QueueItemName, RunnerError};
use crate::observability::PoolCounts;
use crate::typed::DynJob;

/// What happens when a named item is submitted while an item with the same
/// name is still pending.
///
/// Names stop being tracked once an item starts running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Both run.
    #[default]
    Independent,
    /// The new submission is dropped.
    Coalesce,
    /// The pending item is dropped; the new submission takes its place at
    /// the back of its priority class.
    Replace,
}

pub struct QueueItem {
    pub job_id: JobId,
    pub name: Option<QueueItemName>,
    pub priority: Priority,
    pub job: Arc<dyn DynJob>,
    pub args: JobArgs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    Queued,
    Coalesced(QueueItemName),
}

struct Pending {
    priority: Priority,
    seq: u64,
    item: QueueItem,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        // max-heap: higher priority first, then earlier submission
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct PoolState {
    pending: BinaryHeap<Pending>,
    /// Latest pending seq per name. Unused under `Independent`.
    named: HashMap<QueueItemName, u64>,
    next_seq: u64,
    closed: bool,
    counts: PoolCounts,
}

impl PoolState {
    fn new() -> Self {
        Self {
            pending: BinaryHeap::new(),
            named: HashMap::new(),
            next_seq: 0,
            closed: false,
            counts: PoolCounts::default(),
        }
    }

    fn take_next(&mut self) -> Option<QueueItem> {
        while let Some(entry) = self.pending.pop() {
            if let Some(name) = &entry.item.name
                && let Some(&latest) = self.named.get(name)
            {
                if latest != entry.seq {
                    // superseded by a Replace submission
                    continue;
                }
                self.named.remove(name);
            }
            self.counts.pending -= 1;
            self.counts.running += 1;
            return Some(entry.item);
        }
        None
    }
}

struct Shared {
    state: Mutex<PoolState>,
    notify: Notify,
}

impl Shared {
    async fn take_next(&self) -> Option<QueueItem> {
        self.state.lock().await.take_next()
    }

    async fn execute(&self, worker_id: usize, item: QueueItem) {
        let span = tracing::info_span!(
            "job",
            job_id = %item.job_id,
            job_type = %item.job.job_type(),
            worker = worker_id,
        );
        let QueueItem { job, args, .. } = item;

        let handle = tokio::spawn(async move { job.perform_dyn(args).await }.instrument(span.clone()));
        let failed = match handle.await {
            Ok(Ok(())) => {
                span.in_scope(|| tracing::debug!("job completed"));
                false
            }
            Ok(Err(e)) => {
                span.in_scope(|| tracing::error!(error = %e, "job failed"));
                true
            }
            Err(e) if e.is_panic() => {
                span.in_scope(|| tracing::error!("job panicked"));
                true
            }
            Err(e) => {
                span.in_scope(|| tracing::error!(error = %e, "job task aborted"));
                true
            }
        };

        let mut state = self.state.lock().await;
        state.counts.running -= 1;
        if failed {
            state.counts.failed += 1;
        } else {
            state.counts.completed += 1;
        }
    }
}

/// Fixed-size pool of tokio workers pulling from a priority queue.
///
/// Must be started from within a tokio runtime.
pub struct WorkerPool {
    shared: Arc<Shared>,
    policy: DuplicatePolicy,
    shutdown_tx: watch::Sender<bool>,
    joins: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn start(workers: usize, policy: DuplicatePolicy) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState::new()),
            notify: Notify::new(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let workers = workers.max(1);
        let mut joins = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let shared = Arc::clone(&shared);
            let rx = shutdown_rx.clone();
            joins.push(tokio::spawn(worker_loop(worker_id, shared, rx)));
        }
        tracing::debug!(workers, ?policy, "in-process worker pool started");

        Self {
            shared,
            policy,
            shutdown_tx,
            joins: Mutex::new(joins),
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub async fn submit(&self, item: QueueItem) -> Result<Submitted, RunnerError> {
        let mut state = self.shared.state.lock().await;
        if state.closed {
            return Err(RunnerError::Closed);
        }

        let tracked = self.policy != DuplicatePolicy::Independent;
        if tracked
            && let Some(name) = &item.name
            && state.named.contains_key(name)
        {
            match self.policy {
                DuplicatePolicy::Coalesce => {
                    state.counts.coalesced += 1;
                    return Ok(Submitted::Coalesced(name.clone()));
                }
                DuplicatePolicy::Replace => {
                    // the stale heap entry is skipped when popped
                    state.counts.replaced += 1;
                    state.counts.pending -= 1;
                }
                DuplicatePolicy::Independent => {}
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        if tracked && let Some(name) = &item.name {
            state.named.insert(name.clone(), seq);
        }
        state.pending.push(Pending {
            priority: item.priority,
            seq,
            item,
        });
        state.counts.pending += 1;
        drop(state);

        self.shared.notify.notify_one();
        Ok(Submitted::Queued)
    }

    pub async fn counts(&self) -> PoolCounts {
        self.shared.state.lock().await.counts.clone()
    }

    /// Reject new work, let workers drain what is pending, and wait for them.
    pub async fn shutdown(&self) {
        self.shared.state.lock().await.closed = true;
        let _ = self.shutdown_tx.send(true);

        let joins = std::mem::take(&mut *self.joins.lock().await);
        for join in joins {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "worker pool task ended abnormally");
            }
        }
    }
}

async fn worker_loop(worker_id: usize, shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        if let Some(item) = shared.take_next().await {
            shared.execute(worker_id, item).await;
            continue;
        }

        // Queue is drained here, so shutdown can take effect.
        if *shutdown_rx.borrow_and_update() {
            break;
        }

        tokio::select! {
            _ = shared.notify.notified() => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    tracing::trace!(worker_id, "in-process worker stopped");
}
