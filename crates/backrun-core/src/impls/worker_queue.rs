//! WorkerQueueStrategy - one adapter per job type, each bound to a queue.
//!
//! `extend_job` generates the adapter for a job type. Extending the same
//! type again replaces the existing adapter, so there is never more than
//! one per job type.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::enqueue::Enqueuer;
use crate::domain::{DispatchReceipt, JobArgs, JobType, RunnerError};
use crate::ports::{ExecutionStrategy, StrategyKind};
use crate::typed::DynJob;

pub const DEFAULT_WORKER_QUEUE: &str = "default";

/// Job type -> queue name, with a fallback queue.
#[derive(Debug, Clone)]
pub struct QueueRoutes {
    routes: HashMap<JobType, String>,
    default_queue: String,
}

impl QueueRoutes {
    pub fn new(default_queue: impl Into<String>) -> Self {
        Self {
            routes: HashMap::new(),
            default_queue: default_queue.into(),
        }
    }

    pub fn with_routes(mut self, routes: HashMap<JobType, String>) -> Self {
        self.routes.extend(routes);
        self
    }

    pub fn route(mut self, job_type: impl Into<JobType>, queue: impl Into<String>) -> Self {
        self.routes.insert(job_type.into(), queue.into());
        self
    }

    pub fn queue_for(&self, job_type: &JobType) -> &str {
        self.routes
            .get(job_type)
            .map(String::as_str)
            .unwrap_or(&self.default_queue)
    }

    pub fn default_queue(&self) -> &str {
        &self.default_queue
    }
}

impl Default for QueueRoutes {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_QUEUE)
    }
}

/// Wraps a job so it can be enqueued asynchronously onto its own queue.
pub struct WorkerAdapter {
    job: Arc<dyn DynJob>,
    queue: String,
    enqueuer: Enqueuer,
}

impl WorkerAdapter {
    pub fn job_type(&self) -> JobType {
        self.job.job_type()
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Hand `args` to the adapter's queue; a worker performs the job later.
    pub async fn perform_async(&self, args: JobArgs) -> Result<DispatchReceipt, RunnerError> {
        self.enqueuer
            .enqueue(StrategyKind::WorkerQueue, self.job.as_ref(), args, &self.queue)
            .await
    }
}

pub struct WorkerQueueStrategy {
    enqueuer: Enqueuer,
    routes: QueueRoutes,
    adapters: RwLock<HashMap<JobType, Arc<WorkerAdapter>>>,
}

impl WorkerQueueStrategy {
    pub fn new(enqueuer: Enqueuer, routes: QueueRoutes) -> Self {
        Self {
            enqueuer,
            routes,
            adapters: RwLock::new(HashMap::new()),
        }
    }

    /// Generate (or regenerate) the adapter for `job`'s type.
    pub fn extend_job(&self, job: Arc<dyn DynJob>) -> Arc<WorkerAdapter> {
        let job_type = job.job_type();
        let queue = self.routes.queue_for(&job_type).to_string();
        let adapter = Arc::new(WorkerAdapter {
            job,
            queue,
            enqueuer: self.enqueuer.clone(),
        });

        let mut adapters = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
        if adapters.insert(job_type.clone(), adapter.clone()).is_some() {
            tracing::debug!(%job_type, queue = adapter.queue(), "replaced worker adapter");
        } else {
            tracing::debug!(%job_type, queue = adapter.queue(), "extended job with worker adapter");
        }
        adapter
    }

    pub fn adapter(&self, job_type: &str) -> Option<Arc<WorkerAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_type)
            .cloned()
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Distinct queues the current adapters push to, sorted.
    pub fn queue_names(&self) -> Vec<String> {
        let adapters = self.adapters.read().unwrap_or_else(PoisonError::into_inner);
        adapters
            .values()
            .map(|a| a.queue.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn routes(&self) -> &QueueRoutes {
        &self.routes
    }

    pub fn is_inline(&self) -> bool {
        self.enqueuer.is_inline()
    }
}

#[async_trait]
impl ExecutionStrategy for WorkerQueueStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WorkerQueue
    }

    async fn run(
        &self,
        job: Arc<dyn DynJob>,
        args: JobArgs,
    ) -> Result<DispatchReceipt, RunnerError> {
        let job_type = job.job_type();
        let adapter = self
            .adapter(job_type.as_str())
            .ok_or(RunnerError::Resolution(job_type))?;
        adapter.perform_async(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Disposition, ErrorKind};
    use crate::impls::InMemoryBroker;
    use crate::ports::Broker;
    use crate::typed::ArgsCodec;
    use crate::typed::job::testing::{FailingJob, RecordingJob};
    use serde_json::json;
    use std::time::Duration;

    fn strategy_with(broker: Arc<InMemoryBroker>, routes: QueueRoutes) -> WorkerQueueStrategy {
        WorkerQueueStrategy::new(Enqueuer::broker(broker), routes)
    }

    #[test]
    fn extending_twice_keeps_one_adapter() {
        let strategy = strategy_with(Arc::new(InMemoryBroker::new()), QueueRoutes::default());
        let (first, _rx1) = RecordingJob::new("rebuild_digest");
        let (second, _rx2) = RecordingJob::new("rebuild_digest");

        let a = strategy.extend_job(first);
        let b = strategy.extend_job(second);

        assert_eq!(strategy.adapter_count(), 1);
        assert!(!Arc::ptr_eq(&a, &b));
        let current = strategy.adapter("rebuild_digest").unwrap();
        assert!(Arc::ptr_eq(&current, &b));
    }

    #[test]
    fn routes_fall_back_to_default_queue() {
        let routes = QueueRoutes::new("low").route("deliver_notice", "mail");
        assert_eq!(routes.default_queue(), "low");
        assert_eq!(routes.queue_for(&JobType::new("deliver_notice")), "mail");
        assert_eq!(routes.queue_for(&JobType::new("rebuild_digest")), "low");
        assert_eq!(QueueRoutes::default().default_queue(), "default");
    }

    #[tokio::test]
    async fn run_pushes_onto_the_job_types_queue() {
        let broker = Arc::new(InMemoryBroker::new());
        let strategy = strategy_with(
            broker.clone(),
            QueueRoutes::default().route("deliver_notice", "mail"),
        );
        assert!(!strategy.is_inline());
        assert_eq!(strategy.routes().default_queue(), "default");
        let (notice, mut notice_rx) = RecordingJob::new("deliver_notice");
        let (digest, _digest_rx) = RecordingJob::new("rebuild_digest");
        strategy.extend_job(notice.clone());
        strategy.extend_job(digest.clone());

        let receipt = strategy.run(notice, vec![json!(7)]).await.unwrap();
        assert_eq!(receipt.queue(), Some("mail"));
        assert!(notice_rx.try_recv().is_err());
        strategy.run(digest, vec![]).await.unwrap();

        assert_eq!(strategy.queue_names(), vec!["default".to_string(), "mail".to_string()]);
        assert_eq!(broker.depth("mail").await.unwrap(), 1);
        assert_eq!(broker.depth("default").await.unwrap(), 1);

        let raw = broker
            .pop("mail", Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        let envelope = ArgsCodec::decode_envelope(&raw).unwrap();
        assert_eq!(envelope.job_type.as_str(), "deliver_notice");
        assert_eq!(envelope.args, vec![json!(7)]);
    }

    #[tokio::test]
    async fn job_without_adapter_is_resolution_error() {
        let strategy = strategy_with(Arc::new(InMemoryBroker::new()), QueueRoutes::default());
        let (job, _rx) = RecordingJob::new("deliver_notice");

        let err = strategy.run(job, vec![]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
    }

    #[tokio::test]
    async fn inline_adapter_performs_immediately() {
        let strategy = WorkerQueueStrategy::new(Enqueuer::inline(), QueueRoutes::default());
        assert!(strategy.is_inline());
        let (job, mut rx) = RecordingJob::new("deliver_notice");
        let adapter = strategy.extend_job(job);

        let receipt = adapter.perform_async(vec![json!("x")]).await.unwrap();
        assert_eq!(
            receipt.disposition,
            Disposition::PerformedInline {
                queue: "default".into()
            }
        );
        assert_eq!(rx.try_recv().unwrap().1, vec![json!("x")]);
    }

    #[tokio::test]
    async fn inline_adapter_propagates_failure() {
        let strategy = WorkerQueueStrategy::new(Enqueuer::inline(), QueueRoutes::default());
        let job: Arc<dyn DynJob> = Arc::new(FailingJob {
            name: "rebuild_digest",
            message: "index missing",
        });
        strategy.extend_job(job.clone());

        let err = strategy.run(job, vec![]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
    }
}
