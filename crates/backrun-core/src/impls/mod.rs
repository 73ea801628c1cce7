//! Impls - broker adapters and the execution strategies.
//!
//! # Brokers
//! - **InMemoryBroker**: process-local queues (dev/test)
//! - **RedisBroker**: Redis lists (LPUSH/BRPOP)
//!
//! # Strategies
//! - **InProcessStrategy** on top of `WorkerPool`
//! - **SharedQueueStrategy** and **WorkerQueueStrategy** on top of `Enqueuer`

pub mod enqueue;
pub mod in_process;
pub mod inmem_broker;
pub mod redis_broker;
pub mod shared_queue;
pub mod worker_pool;
pub mod worker_queue;

pub use self::enqueue::Enqueuer;
pub use self::in_process::InProcessStrategy;
pub use self::inmem_broker::InMemoryBroker;
pub use self::redis_broker::RedisBroker;
pub use self::shared_queue::{DEFAULT_SHARED_QUEUE, SharedQueueStrategy};
pub use self::worker_pool::{DuplicatePolicy, QueueItem, Submitted, WorkerPool};
pub use self::worker_queue::{DEFAULT_WORKER_QUEUE, QueueRoutes, WorkerAdapter, WorkerQueueStrategy};
