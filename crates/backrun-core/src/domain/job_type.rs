use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Name of a job type, as registered in the [`JobRegistry`](crate::typed::JobRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobType(String);

impl JobType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for JobType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for JobType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for JobType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for JobType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Ordered argument list forwarded verbatim to `perform`.
pub type JobArgs = Vec<serde_json::Value>;
