//! App - wiring and the runtime surface.
//!
//! # Components
//! - **RunnerConfig**: TOML configuration
//! - **RunnerBuilder**: registers jobs, connects brokers, picks the strategy
//! - **BackgroundRunner**: the dispatch facade
//! - **WorkerGroup**: broker consumer for the queue strategies

pub mod builder;
pub mod config;
pub mod runner;
pub mod worker_loop;

pub use self::builder::{BuildError, RunnerBuilder};
pub use self::config::{
    ConfigError, Environment, InProcessConfig, LogFormat, LoggingConfig, RunnerConfig,
    SharedQueueConfig, WorkerQueueConfig,
};
pub use self::runner::{BackgroundRunner, JobRef};
pub use self::worker_loop::WorkerGroup;
