//! backrun-core
//!
//! Background job dispatch behind one facade, with interchangeable back ends.
//!
//! # Modules
//! - **domain**: job types, ids, priorities, envelopes, receipts, errors
//! - **typed**: `Job` trait, `DynJob`, `JobRegistry`, `ArgsCodec`
//! - **ports**: `ExecutionStrategy`, `Broker`, `Clock`, `IdGenerator`
//! - **impls**: worker pool, brokers (in-memory, Redis), the three strategies
//! - **app**: config, `RunnerBuilder`, `BackgroundRunner`, `WorkerGroup`
//! - **observability**: tracing setup and pool counters

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod typed;

pub use app::{BackgroundRunner, BuildError, JobRef, RunnerBuilder, RunnerConfig, WorkerGroup};
pub use domain::{DispatchReceipt, Disposition, JobArgs, JobError, JobType, Priority, RunnerError};
pub use ports::StrategyKind;
pub use typed::{DynJob, Job};

/// Re-exported so `Job` impls don't need their own `async-trait` dependency.
pub use async_trait::async_trait;
