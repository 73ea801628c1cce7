//! BackgroundRunner - the single dispatch entry point.
//!
//! Resolves a job reference, then hands it to the strategy chosen at
//! startup. Errors from the strategy are returned unchanged.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::worker_loop::WorkerGroup;
use crate::domain::{DispatchReceipt, JobArgs, JobType, RunnerError};
use crate::ports::{Broker, ExecutionStrategy, StrategyKind};
use crate::typed::{ArgsCodec, DynJob, Job, JobRegistry};

/// What `run` dispatches: a registered name or a job handle.
#[derive(Clone)]
pub enum JobRef {
    Name(JobType),
    Job(Arc<dyn DynJob>),
}

impl From<&str> for JobRef {
    fn from(name: &str) -> Self {
        JobRef::Name(JobType::new(name))
    }
}

impl From<String> for JobRef {
    fn from(name: String) -> Self {
        JobRef::Name(JobType::new(name))
    }
}

impl From<JobType> for JobRef {
    fn from(job_type: JobType) -> Self {
        JobRef::Name(job_type)
    }
}

impl From<Arc<dyn DynJob>> for JobRef {
    fn from(job: Arc<dyn DynJob>) -> Self {
        JobRef::Job(job)
    }
}

/// Consumer side of a queue strategy: where workers pop from.
pub(crate) struct ConsumerSide {
    pub(crate) broker: Arc<dyn Broker>,
    pub(crate) queues: Vec<String>,
}

pub struct BackgroundRunner {
    strategy: Arc<dyn ExecutionStrategy>,
    registry: Arc<JobRegistry>,
    consumer: Option<ConsumerSide>,
    closed: AtomicBool,
}

impl BackgroundRunner {
    pub(crate) fn new(
        strategy: Arc<dyn ExecutionStrategy>,
        registry: Arc<JobRegistry>,
        consumer: Option<ConsumerSide>,
    ) -> Self {
        Self {
            strategy,
            registry,
            consumer,
            closed: AtomicBool::new(false),
        }
    }

    /// Dispatch `job` with positional `args`.
    ///
    /// An unknown name fails with `RunnerError::Resolution` before the
    /// strategy (and any broker) is involved. The queue strategies hand jobs
    /// to workers that resolve them by name, so they also reject a direct
    /// reference to a job type that is not registered.
    pub async fn run(
        &self,
        job: impl Into<JobRef>,
        args: JobArgs,
    ) -> Result<DispatchReceipt, RunnerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RunnerError::Closed);
        }

        let job = match job.into() {
            JobRef::Name(name) => self.registry.resolve(name.as_str())?,
            JobRef::Job(job) => {
                let job_type = job.job_type();
                if self.strategy() != StrategyKind::InProcess
                    && !self.registry.contains(job_type.as_str())
                {
                    return Err(RunnerError::Resolution(job_type));
                }
                job
            }
        };

        let receipt = self.strategy.run(job, args).await?;
        tracing::info!(
            job_id = %receipt.job_id,
            job_type = %receipt.job_type,
            strategy = %receipt.strategy,
            "job dispatched"
        );
        Ok(receipt)
    }

    /// Typed dispatch by `J::NAME`.
    pub async fn run_job<J: Job>(&self, args: J::Args) -> Result<DispatchReceipt, RunnerError> {
        let args = ArgsCodec::encode_args(&args)?;
        self.run(J::NAME, args).await
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Queues a consumer would pop from; empty for in-process or inline runners.
    pub fn consumer_queues(&self) -> &[String] {
        self.consumer
            .as_ref()
            .map(|c| c.queues.as_slice())
            .unwrap_or_default()
    }

    /// Start a `WorkerGroup` on the consumer side of a queue strategy.
    pub fn spawn_workers(
        &self,
        concurrency: usize,
        poll_timeout: Duration,
    ) -> Result<WorkerGroup, RunnerError> {
        let Some(consumer) = &self.consumer else {
            return Err(RunnerError::Configuration(format!(
                "'{}' runner has no broker queues to consume",
                self.strategy()
            )));
        };
        if concurrency == 0 {
            return Err(RunnerError::Configuration(
                "concurrency must be at least 1".into(),
            ));
        }
        if poll_timeout.is_zero() {
            return Err(RunnerError::Configuration(
                "poll timeout must be greater than zero".into(),
            ));
        }
        Ok(WorkerGroup::spawn(
            Arc::clone(&consumer.broker),
            Arc::clone(&self.registry),
            &consumer.queues,
            concurrency,
            poll_timeout,
        ))
    }

    /// Put entries a crashed consumer left in flight back onto their queues.
    /// Call before `spawn_workers`, while nothing else consumes the queues.
    pub async fn requeue_in_flight(&self) -> Result<usize, RunnerError> {
        let Some(consumer) = &self.consumer else {
            return Ok(0);
        };
        let mut moved = 0;
        for queue in &consumer.queues {
            moved += consumer
                .broker
                .requeue_in_flight(queue)
                .await
                .map_err(|e| RunnerError::Configuration(format!("requeue of '{queue}' failed: {e}")))?;
        }
        Ok(moved)
    }

    /// Reject further dispatches and let the strategy wind down.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.strategy.shutdown().await;
        tracing::info!(strategy = %self.strategy(), "background runner shut down");
    }
}
