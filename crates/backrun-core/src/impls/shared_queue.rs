//! SharedQueueStrategy - every job type goes onto one durable queue.

use std::sync::Arc;

use async_trait::async_trait;

use super::enqueue::Enqueuer;
use crate::domain::{DispatchReceipt, JobArgs, RunnerError};
use crate::ports::{ExecutionStrategy, StrategyKind};
use crate::typed::DynJob;

pub const DEFAULT_SHARED_QUEUE: &str = "backrun";

pub struct SharedQueueStrategy {
    enqueuer: Enqueuer,
    queue: String,
}

impl SharedQueueStrategy {
    pub fn new(enqueuer: Enqueuer, queue: impl Into<String>) -> Self {
        Self {
            enqueuer,
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn is_inline(&self) -> bool {
        self.enqueuer.is_inline()
    }
}

#[async_trait]
impl ExecutionStrategy for SharedQueueStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SharedQueue
    }

    async fn run(
        &self,
        job: Arc<dyn DynJob>,
        args: JobArgs,
    ) -> Result<DispatchReceipt, RunnerError> {
        self.enqueuer
            .enqueue(StrategyKind::SharedQueue, job.as_ref(), args, &self.queue)
            .await
    }
}
