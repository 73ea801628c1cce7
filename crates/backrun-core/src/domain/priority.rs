//! Priority - in-process scheduling weight.
//!
//! Only the in-process strategy reads priorities. Broker-backed queues are
//! FIFO and ignore them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::job_type::JobType;

/// Scheduling weight of a job type. Higher runs earlier.
///
/// Configuration may spell it as an integer or as one of the symbolic names
/// `lowest`, `low`, `normal`, `high`, `highest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Priority(i32);

impl Priority {
    pub const LOWEST: Priority = Priority(-2);
    pub const LOW: Priority = Priority(-1);
    pub const NORMAL: Priority = Priority(0);
    pub const HIGH: Priority = Priority(1);
    pub const HIGHEST: Priority = Priority(2);

    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown priority '{0}' (expected an integer or one of lowest, low, normal, high, highest)")]
pub struct ParsePriorityError(String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowest" => Ok(Self::LOWEST),
            "low" => Ok(Self::LOW),
            "normal" | "default" => Ok(Self::NORMAL),
            "high" => Ok(Self::HIGH),
            "highest" => Ok(Self::HIGHEST),
            other => other
                .parse::<i32>()
                .map(Self)
                .map_err(|_| ParsePriorityError(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i32),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(Self(value)),
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Static per-job-type priority table.
///
/// Read-only after load. Missing entries resolve to [`Priority::NORMAL`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityTable {
    entries: HashMap<JobType, Priority>,
}

impl PriorityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, job_type: impl Into<JobType>, priority: Priority) -> Self {
        self.entries.insert(job_type.into(), priority);
        self
    }

    pub fn priority_for(&self, job_type: &JobType) -> Priority {
        self.entries.get(job_type).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
