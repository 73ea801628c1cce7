//! InProcessStrategy - run jobs on a worker pool inside this process.
//!
//! Fire-and-forget: `run` only queues the item. Failures inside `perform`
//! are logged by the pool and never reach the caller.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::worker_pool::{QueueItem, Submitted, WorkerPool};
use crate::domain::{
    DispatchReceipt, Disposition, JobArgs, JobType, PriorityTable, QueueItemName, RunnerError,
};
use crate::observability::PoolCounts;
use crate::ports::{ExecutionStrategy, IdGenerator, StrategyKind, SystemClock, UlidGenerator};
use crate::typed::DynJob;

pub struct InProcessStrategy {
    pool: WorkerPool,
    priorities: PriorityTable,
    /// Job types dispatched without a queue item name.
    anonymous_jobs: HashSet<JobType>,
    ids: Arc<dyn IdGenerator>,
}

impl InProcessStrategy {
    pub fn new(pool: WorkerPool, priorities: PriorityTable) -> Self {
        Self {
            pool,
            priorities,
            anonymous_jobs: HashSet::new(),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }

    pub fn with_anonymous_jobs<I, T>(mut self, jobs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<JobType>,
    {
        self.anonymous_jobs.extend(jobs.into_iter().map(Into::into));
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Tracking name for a dispatch; `None` for anonymous job types.
    pub fn queue_item_name(
        &self,
        job_type: &JobType,
        args: &[serde_json::Value],
    ) -> Option<QueueItemName> {
        if self.anonymous_jobs.contains(job_type) {
            return None;
        }
        Some(QueueItemName::new(job_type.clone(), args))
    }

    pub async fn counts(&self) -> PoolCounts {
        self.pool.counts().await
    }
}

#[async_trait]
impl ExecutionStrategy for InProcessStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::InProcess
    }

    async fn run(
        &self,
        job: Arc<dyn DynJob>,
        args: JobArgs,
    ) -> Result<DispatchReceipt, RunnerError> {
        let job_type = job.job_type();
        let name = self.queue_item_name(&job_type, &args);
        let priority = self.priorities.priority_for(&job_type);
        let job_id = self.ids.generate_job_id();

        let submitted = self
            .pool
            .submit(QueueItem {
                job_id,
                name: name.clone(),
                priority,
                job,
                args,
            })
            .await?;

        let disposition = match submitted {
            Submitted::Queued => Disposition::Spawned {
                queue_item: name,
                priority,
            },
            Submitted::Coalesced(queue_item) => {
                tracing::debug!(%job_id, %queue_item, "coalesced with pending item");
                Disposition::Coalesced { queue_item }
            }
        };

        Ok(DispatchReceipt {
            job_id,
            job_type,
            strategy: StrategyKind::InProcess,
            disposition,
        })
    }

    async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
