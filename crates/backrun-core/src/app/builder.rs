//! RunnerBuilder - wires configuration, jobs and brokers into a runner.
//!
//! Fail-fast: a missing connection setting, an unreachable broker or an
//! expected job type that was never registered stops `build()`.

use std::collections::HashMap;
use std::sync::Arc;

use super::config::{ConfigError, RunnerConfig};
use super::runner::{BackgroundRunner, ConsumerSide};
use crate::impls::{
    Enqueuer, InMemoryBroker, InProcessStrategy, QueueRoutes, RedisBroker, SharedQueueStrategy,
    WorkerPool, WorkerQueueStrategy,
};
use crate::ports::{Broker, BrokerError, ExecutionStrategy, StrategyKind};
use crate::typed::{DynJob, Job, JobRegistry, RegistryError};

/// # Usage
/// ```ignore
/// let runner = RunnerBuilder::new(RunnerConfig::from_file("backrun.toml")?)
///     .register(DeliverNotice::new(mailer))?
///     .expect_jobs(&["deliver_notice"])
///     .build()
///     .await?;
/// ```
pub struct RunnerBuilder {
    config: RunnerConfig,
    registry: JobRegistry,
    expected_jobs: Option<Vec<String>>,
    broker: Option<Arc<dyn Broker>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing job types: {0:?}. These jobs were expected but not registered.")]
    MissingJobTypes(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("broker setup failed: {0}")]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl RunnerBuilder {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            registry: JobRegistry::new(),
            expected_jobs: None,
            broker: None,
        }
    }

    pub fn register<J: Job>(mut self, job: J) -> Result<Self, RegistryError> {
        self.registry.register(job)?;
        Ok(self)
    }

    pub fn register_dyn(mut self, job: Arc<dyn DynJob>) -> Result<Self, RegistryError> {
        self.registry.register_dyn(job)?;
        Ok(self)
    }

    /// Job types that must be registered by the time `build()` runs.
    pub fn expect_jobs(mut self, job_types: &[&str]) -> Self {
        self.expected_jobs = Some(job_types.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Use `broker` for every broker role instead of connecting from the config URLs.
    pub fn with_broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub async fn build(self) -> Result<BackgroundRunner, BuildError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_jobs {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.registry.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingJobTypes(missing));
            }
        }

        let mut brokers = BrokerConnector::new(self.broker);
        let config = &self.config;
        let registry = Arc::new(self.registry);

        let (strategy, consumer): (Arc<dyn ExecutionStrategy>, Option<ConsumerSide>) =
            match config.background_runner {
                StrategyKind::InProcess => {
                    let pool = WorkerPool::start(
                        config.in_process.workers,
                        config.in_process.duplicate_policy,
                    );
                    let strategy: Arc<dyn ExecutionStrategy> = Arc::new(
                        InProcessStrategy::new(pool, config.priorities.clone())
                            .with_anonymous_jobs(config.in_process.anonymous_jobs.iter().cloned()),
                    );
                    (strategy, None)
                }
                StrategyKind::SharedQueue => {
                    let sq = &config.shared_queue;
                    let (enqueuer, consumer) = if config.shared_queue_inline() {
                        (Enqueuer::inline(), None)
                    } else {
                        let broker = brokers.connect(sq.url.as_deref()).await?;
                        let consumer = ConsumerSide {
                            broker: Arc::clone(&broker),
                            queues: vec![sq.queue.clone()],
                        };
                        (Enqueuer::broker(broker), Some(consumer))
                    };
                    let strategy: Arc<dyn ExecutionStrategy> =
                        Arc::new(SharedQueueStrategy::new(enqueuer, &sq.queue));
                    (strategy, consumer)
                }
                StrategyKind::WorkerQueue => {
                    let wq = &config.worker_queue;
                    let routes =
                        QueueRoutes::new(&wq.default_queue).with_routes(wq.queues.clone());

                    let (enqueuer, server) = if config.worker_queue_inline() {
                        (Enqueuer::inline(), None)
                    } else {
                        let client = brokers.connect(wq.client_url.as_deref()).await?;
                        let server = brokers.connect(wq.server_url()).await?;
                        (Enqueuer::broker(client), Some(server))
                    };

                    let strategy = WorkerQueueStrategy::new(enqueuer, routes);
                    for job in registry.jobs() {
                        strategy.extend_job(Arc::clone(job));
                    }
                    let consumer = server.map(|broker| ConsumerSide {
                        broker,
                        queues: strategy.queue_names(),
                    });
                    let strategy: Arc<dyn ExecutionStrategy> = Arc::new(strategy);
                    (strategy, consumer)
                }
            };

        tracing::info!(
            strategy = %config.background_runner,
            environment = ?config.environment,
            jobs = registry.len(),
            "background runner ready"
        );
        Ok(BackgroundRunner::new(strategy, registry, consumer))
    }
}

/// Connects brokers by URL scheme, sharing one handle per URL.
struct BrokerConnector {
    override_broker: Option<Arc<dyn Broker>>,
    connected: HashMap<String, Arc<dyn Broker>>,
}

impl BrokerConnector {
    fn new(override_broker: Option<Arc<dyn Broker>>) -> Self {
        Self {
            override_broker,
            connected: HashMap::new(),
        }
    }

    async fn connect(&mut self, url: Option<&str>) -> Result<Arc<dyn Broker>, BuildError> {
        if let Some(broker) = &self.override_broker {
            return Ok(Arc::clone(broker));
        }
        let url = url.ok_or_else(|| ConfigError::Invalid("broker url is required".into()))?;
        if let Some(broker) = self.connected.get(url) {
            return Ok(Arc::clone(broker));
        }

        let broker: Arc<dyn Broker> = if url.starts_with("memory://") {
            tracing::warn!("using in-memory broker; queued jobs do not survive this process");
            Arc::new(InMemoryBroker::new())
        } else if url.starts_with("redis://") || url.starts_with("rediss://") {
            let broker = RedisBroker::connect(url).await?;
            broker.ping().await?;
            Arc::new(broker)
        } else {
            return Err(ConfigError::Invalid(format!("unsupported broker url scheme: {url}")).into());
        };

        self.connected.insert(url.to_string(), Arc::clone(&broker));
        Ok(broker)
    }
}
