//! ExecutionStrategy port - the back end a dispatched job is handed to.
//!
//! Implementations:
//! - `InProcessStrategy`: priority worker pool in this process
//! - `SharedQueueStrategy`: one durable broker queue for every job type
//! - `WorkerQueueStrategy`: one adapter (and queue) per job type

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{DispatchReceipt, JobArgs, RunnerError};
use crate::typed::DynJob;

/// Which strategy a process runs with. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[serde(alias = "InProcess")]
    InProcess,
    #[serde(alias = "QueueA")]
    SharedQueue,
    #[serde(alias = "QueueB")]
    WorkerQueue,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::InProcess => "in_process",
            StrategyKind::SharedQueue => "shared_queue",
            StrategyKind::WorkerQueue => "worker_queue",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_process" | "InProcess" => Ok(StrategyKind::InProcess),
            "shared_queue" | "QueueA" => Ok(StrategyKind::SharedQueue),
            "worker_queue" | "QueueB" => Ok(StrategyKind::WorkerQueue),
            other => Err(RunnerError::Configuration(format!(
                "unknown background runner '{other}'"
            ))),
        }
    }
}

/// A back end that takes over a resolved job.
///
/// `run` returns once the job has been handed off; it never waits for
/// `perform` unless the strategy runs inline.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn run(&self, job: Arc<dyn DynJob>, args: JobArgs)
    -> Result<DispatchReceipt, RunnerError>;

    /// Stop accepting work and release resources.
    async fn shutdown(&self) {}
}
