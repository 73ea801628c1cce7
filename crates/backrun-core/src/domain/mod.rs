//! Domain model (job types, ids, priorities, envelopes, receipts, errors).

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod job_type;
pub mod priority;
pub mod receipt;

pub use self::envelope::JobEnvelope;
pub use self::errors::{ErrorKind, JobError, RunnerError};
pub use self::ids::JobId;
pub use self::job_type::{JobArgs, JobType};
pub use self::priority::{ParsePriorityError, Priority, PriorityTable};
pub use self::receipt::{DispatchReceipt, Disposition, QueueItemName};
