//! DispatchReceipt - what `run` hands back to the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::JobId;
use super::job_type::JobType;
use super::priority::Priority;
use crate::ports::StrategyKind;

/// In-process tracking name: job type plus the string form of its arguments.
///
/// Two dispatches with the same type and arguments get equal names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueItemName {
    pub job_type: JobType,
    pub args: String,
}

impl QueueItemName {
    pub fn new(job_type: JobType, args: &[serde_json::Value]) -> Self {
        // Compact JSON of equal values is byte-identical.
        let args = serde_json::Value::Array(args.to_vec()).to_string();
        Self { job_type, args }
    }
}

impl fmt::Display for QueueItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.job_type, self.args)
    }
}

/// How a strategy disposed of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    /// Handed to the in-process worker pool.
    Spawned {
        queue_item: Option<QueueItemName>,
        priority: Priority,
    },

    /// Dropped because an identically named item was already pending.
    Coalesced { queue_item: QueueItemName },

    /// Pushed onto a broker queue.
    Enqueued { queue: String },

    /// Performed synchronously on the caller (inline/test mode).
    PerformedInline { queue: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub job_id: JobId,
    pub job_type: JobType,
    pub strategy: StrategyKind,
    pub disposition: Disposition,
}

impl DispatchReceipt {
    /// Tracking name, if the job went to the in-process pool with one.
    pub fn queue_item(&self) -> Option<&QueueItemName> {
        match &self.disposition {
            Disposition::Spawned { queue_item, .. } => queue_item.as_ref(),
            Disposition::Coalesced { queue_item } => Some(queue_item),
            _ => None,
        }
    }

    /// Destination queue, for broker-backed strategies.
    pub fn queue(&self) -> Option<&str> {
        match &self.disposition {
            Disposition::Enqueued { queue } | Disposition::PerformedInline { queue } => {
                Some(queue)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn queue_item_name_is_deterministic() {
        let args = vec![json!(42), json!("abc"), json!({"k": [1, 2]})];
        let a = QueueItemName::new(JobType::new("digest"), &args);
        let b = QueueItemName::new(JobType::new("digest"), &args.clone());
        assert_eq!(a, b);
        assert_eq!(a.to_string(), r#"digest:[42,"abc",{"k":[1,2]}]"#);
    }

    #[test]
    fn queue_item_name_differs_by_args() {
        let a = QueueItemName::new(JobType::new("digest"), &[json!(1)]);
        let b = QueueItemName::new(JobType::new("digest"), &[json!(2)]);
        assert_ne!(a, b);
    }
}
