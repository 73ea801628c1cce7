//! Job identifiers.
//!
//! ULID so that ids sort by creation time and can be minted on any node
//! without coordination.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier assigned to a job when it is dispatched.
///
/// Used for log correlation and as the identity of a queue entry. The
/// dispatcher never deduplicates on it.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Ulid);

impl JobId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for JobId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}
