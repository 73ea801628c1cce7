//! Enqueuer - the hand-off shared by the broker-backed strategies.
//!
//! Either pushes an encoded `JobEnvelope` onto a broker queue, or, in
//! inline/test mode, performs the job on the caller.

use std::sync::Arc;

use crate::domain::{DispatchReceipt, Disposition, JobArgs, JobEnvelope, RunnerError};
use crate::ports::{Broker, Clock, IdGenerator, StrategyKind, SystemClock, UlidGenerator};
use crate::typed::{ArgsCodec, DynJob};

#[derive(Clone)]
enum Delivery {
    Broker(Arc<dyn Broker>),
    Inline,
}

#[derive(Clone)]
pub struct Enqueuer {
    delivery: Delivery,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl Enqueuer {
    pub fn broker(broker: Arc<dyn Broker>) -> Self {
        Self::with_delivery(Delivery::Broker(broker))
    }

    /// Performs every job immediately; `perform` errors propagate.
    pub fn inline() -> Self {
        Self::with_delivery(Delivery::Inline)
    }

    fn with_delivery(delivery: Delivery) -> Self {
        Self {
            delivery,
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.delivery, Delivery::Inline)
    }

    pub async fn enqueue(
        &self,
        strategy: StrategyKind,
        job: &dyn DynJob,
        args: JobArgs,
        queue: &str,
    ) -> Result<DispatchReceipt, RunnerError> {
        let job_type = job.job_type();
        let job_id = self.ids.generate_job_id();

        let disposition = match &self.delivery {
            Delivery::Inline => {
                tracing::debug!(%job_id, %job_type, queue, "performing inline");
                job.perform_dyn(args)
                    .await
                    .map_err(|source| RunnerError::Execution {
                        job_type: job_type.clone(),
                        source,
                    })?;
                Disposition::PerformedInline {
                    queue: queue.to_string(),
                }
            }
            Delivery::Broker(broker) => {
                let envelope =
                    JobEnvelope::new(job_id, job_type.clone(), args, queue, self.clock.now());
                let payload = ArgsCodec::encode_envelope(&envelope)?;
                broker
                    .push(queue, payload)
                    .await
                    .map_err(|source| RunnerError::Dispatch {
                        job_type: job_type.clone(),
                        source,
                    })?;
                Disposition::Enqueued {
                    queue: queue.to_string(),
                }
            }
        };

        Ok(DispatchReceipt {
            job_id,
            job_type,
            strategy,
            disposition,
        })
    }
}
