//! JobEnvelope - the queue entry pushed to a broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::JobId;
use super::job_type::{JobArgs, JobType};

/// Serialized form of a dispatched job.
///
/// Once pushed, the broker owns the entry. `queue` is carried along so a
/// consumer can tell which destination an entry was meant for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job_id: JobId,
    pub job_type: JobType,
    #[serde(default)]
    pub args: JobArgs,
    pub queue: String,
    pub enqueued_at: DateTime<Utc>,
}

impl JobEnvelope {
    pub fn new(
        job_id: JobId,
        job_type: JobType,
        args: JobArgs,
        queue: impl Into<String>,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            job_type,
            args,
            queue: queue.into(),
            enqueued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use ulid::Ulid;

    #[test]
    fn envelope_without_args_decodes_to_empty_list() {
        let id = JobId::from_ulid(Ulid::new());
        let raw = json!({
            "job_id": id,
            "job_type": "digest",
            "queue": "backrun",
            "enqueued_at": "2024-01-01T12:00:00Z",
        });
        let env: JobEnvelope = serde_json::from_value(raw).unwrap();
        assert!(env.args.is_empty());
        assert_eq!(env.job_id, id);
        assert_eq!(
            env.enqueued_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
        );
    }
}
