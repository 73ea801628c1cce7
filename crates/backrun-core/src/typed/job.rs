//! Job trait - typed `perform`, and its object-safe counterpart.
//!
//! Two layers:
//! - `Job`: typed surface, arguments are a concrete `Args` type.
//! - `DynJob`: object-safe, arguments are a raw `JobArgs` list.
//!
//! `TypedJob<J>` erases a `Job` into a `DynJob` so that jobs of different
//! types can live in one `HashMap<JobType, Arc<dyn DynJob>>`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::codec::ArgsCodec;
use crate::domain::{JobArgs, JobError, JobType};

/// A unit of background work.
///
/// # Usage
/// ```ignore
/// struct DeliverNotice { mailer: Mailer }
///
/// #[async_trait]
/// impl Job for DeliverNotice {
///     const NAME: &'static str = "deliver_notice";
///     type Args = (String, u32);
///
///     async fn perform(&self, (app, notice_id): Self::Args) -> Result<(), JobError> {
///         self.mailer.send(&app, notice_id).await.map_err(|e| JobError::with_source("mail", e))
///     }
/// }
/// ```
///
/// `Args` should be a tuple so that it maps onto the positional argument list
/// (see [`ArgsCodec`]); use `()` for no arguments and `(Option<T>,)` rather
/// than a bare `Option<T>`.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    const NAME: &'static str;

    type Args: Serialize + DeserializeOwned + Send + 'static;

    async fn perform(&self, args: Self::Args) -> Result<(), JobError>;
}

/// Object-safe job handle.
#[async_trait]
pub trait DynJob: Send + Sync {
    fn job_type(&self) -> JobType;

    async fn perform_dyn(&self, args: JobArgs) -> Result<(), JobError>;
}

pub struct TypedJob<J: Job> {
    job: J,
}

impl<J: Job> TypedJob<J> {
    pub fn new(job: J) -> Self {
        Self { job }
    }

    pub fn into_dyn(self) -> Arc<dyn DynJob> {
        Arc::new(self)
    }
}

#[async_trait]
impl<J: Job> DynJob for TypedJob<J> {
    fn job_type(&self) -> JobType {
        JobType::new(J::NAME)
    }

    async fn perform_dyn(&self, args: JobArgs) -> Result<(), JobError> {
        let args: J::Args = ArgsCodec::decode_args(args)?;
        self.job.perform(args).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Jobs shared by the unit tests of the strategies and the facade.

    use super::*;
    use tokio::sync::mpsc;

    /// Reports every `perform` call (job type + raw args) on a channel.
    pub struct RecordingJob {
        name: &'static str,
        tx: mpsc::UnboundedSender<(JobType, JobArgs)>,
    }

    impl RecordingJob {
        pub fn new(
            name: &'static str,
        ) -> (Arc<dyn DynJob>, mpsc::UnboundedReceiver<(JobType, JobArgs)>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Arc::new(Self { name, tx }), rx)
        }
    }

    #[async_trait]
    impl DynJob for RecordingJob {
        fn job_type(&self) -> JobType {
            JobType::new(self.name)
        }

        async fn perform_dyn(&self, args: JobArgs) -> Result<(), JobError> {
            let _ = self.tx.send((self.job_type(), args));
            Ok(())
        }
    }

    /// Always fails with the given message.
    pub struct FailingJob {
        pub name: &'static str,
        pub message: &'static str,
    }

    #[async_trait]
    impl DynJob for FailingJob {
        fn job_type(&self) -> JobType {
            JobType::new(self.name)
        }

        async fn perform_dyn(&self, _args: JobArgs) -> Result<(), JobError> {
            Err(JobError::new(self.message))
        }
    }
}
