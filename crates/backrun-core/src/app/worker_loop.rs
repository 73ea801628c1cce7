//! WorkerGroup - consumes envelopes from broker queues and performs them.
//!
//! # Flow
//! 1. `Broker::pop()` with a bounded timeout
//! 2. decode the `JobEnvelope`
//! 3. resolve the job type through the `JobRegistry`
//! 4. `perform_dyn(args)` in its own task
//! 5. `Broker::ack()` so the entry leaves the in-flight list
//!
//! Undecodable envelopes, unknown job types and failed jobs are logged and
//! dropped. There is no retry. An entry whose worker dies before the ack stays
//! in flight until `Broker::requeue_in_flight`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::ports::Broker;
use crate::typed::{ArgsCodec, JobRegistry};

/// How long a worker waits after a broker error before popping again.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Worker group handle.
/// - `request_shutdown()` stops every worker after its current pop/job
/// - `shutdown_and_join()` also waits for them
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `concurrency` workers per queue.
    pub fn spawn(
        broker: Arc<dyn Broker>,
        registry: Arc<JobRegistry>,
        queues: &[String],
        concurrency: usize,
        poll_timeout: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(queues.len() * concurrency);
        let mut worker_id = 0;
        for queue in queues {
            for _ in 0..concurrency {
                let worker = Worker {
                    worker_id,
                    queue: queue.clone(),
                    broker: Arc::clone(&broker),
                    registry: Arc::clone(&registry),
                    poll_timeout,
                };
                joins.push(tokio::spawn(worker.run(shutdown_rx.clone())));
                worker_id += 1;
            }
        }

        tracing::info!(queues = ?queues, workers = joins.len(), "worker group started");
        Self { shutdown_tx, joins }
    }

    pub fn worker_count(&self) -> usize {
        self.joins.len()
    }

    /// Request shutdown for all workers.
    /// In-flight jobs are not cancelled; workers just stop popping.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "consumer worker ended abnormally");
            }
        }
        tracing::info!("worker group stopped");
    }
}

struct Worker {
    worker_id: usize,
    queue: String,
    broker: Arc<dyn Broker>,
    registry: Arc<JobRegistry>,
    poll_timeout: Duration,
}

impl Worker {
    async fn run(self, shutdown_rx: watch::Receiver<bool>) {
        // A pop is never cancelled halfway, or a popped envelope could be
        // lost; shutdown is only observed between pops.
        while !*shutdown_rx.borrow() {
            match self.broker.pop(&self.queue, self.poll_timeout).await {
                Ok(Some(raw)) => {
                    self.process(&raw).await;
                    if let Err(e) = self.broker.ack(&self.queue, &raw).await {
                        tracing::warn!(worker = self.worker_id, queue = %self.queue, error = %e, "ack failed");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(worker = self.worker_id, queue = %self.queue, error = %e, "pop failed");
                    tokio::time::sleep(ERROR_BACKOFF.min(self.poll_timeout)).await;
                }
            }
        }
        tracing::trace!(worker = self.worker_id, queue = %self.queue, "consumer worker stopped");
    }

    async fn process(&self, raw: &str) {
        let envelope = match ArgsCodec::decode_envelope(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(queue = %self.queue, error = %e, "dropping undecodable envelope");
                return;
            }
        };

        let span = tracing::info_span!(
            "job",
            job_id = %envelope.job_id,
            job_type = %envelope.job_type,
            queue = %envelope.queue,
            worker = self.worker_id,
        );

        let Some(job) = self.registry.get(envelope.job_type.as_str()) else {
            span.in_scope(|| tracing::error!("unknown job type, dropping envelope"));
            return;
        };

        let args = envelope.args;
        let handle = tokio::spawn(async move { job.perform_dyn(args).await }.instrument(span.clone()));
        match handle.await {
            Ok(Ok(())) => span.in_scope(|| tracing::debug!("job completed")),
            Ok(Err(e)) => span.in_scope(|| tracing::error!(error = %e, "job failed")),
            Err(e) if e.is_panic() => span.in_scope(|| tracing::error!("job panicked")),
            Err(e) => span.in_scope(|| tracing::error!(error = %e, "job task aborted")),
        }
    }
}
