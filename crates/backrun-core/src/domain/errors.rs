//! Errors - dispatch error taxonomy.

use thiserror::Error;

use super::job_type::JobType;
use crate::ports::BrokerError;
use crate::typed::CodecError;

/// Operational classification of a [`RunnerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or incomplete configuration. Fatal at startup.
    Configuration,
    /// Job type name could not be resolved.
    Resolution,
    /// Broker unreachable or the enqueue was rejected.
    Dispatch,
    /// `perform` itself failed. Only observable in inline mode.
    Execution,
}

/// Failure raised by a job's `perform`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct JobError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CodecError> for JobError {
    fn from(e: CodecError) -> Self {
        Self::with_source("invalid job arguments", e)
    }
}

/// Errors surfaced synchronously from `BackgroundRunner::run`.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown job type '{0}'")]
    Resolution(JobType),

    #[error("failed to dispatch job '{job_type}': {source}")]
    Dispatch {
        job_type: JobType,
        #[source]
        source: BrokerError,
    },

    #[error("job '{job_type}' failed: {source}")]
    Execution {
        job_type: JobType,
        #[source]
        source: JobError,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("background runner is shut down")]
    Closed,
}

impl RunnerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunnerError::Configuration(_) => ErrorKind::Configuration,
            RunnerError::Resolution(_) => ErrorKind::Resolution,
            RunnerError::Dispatch { .. } | RunnerError::Codec(_) | RunnerError::Closed => {
                ErrorKind::Dispatch
            }
            RunnerError::Execution { .. } => ErrorKind::Execution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn job_error_keeps_source() {
        let io = std::io::Error::other("disk full");
        let err = JobError::with_source("could not write digest", io);
        assert_eq!(err.to_string(), "could not write digest");
        assert!(err.source().is_some());
    }

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(
            RunnerError::Resolution(JobType::new("nope")).kind(),
            ErrorKind::Resolution
        );
        assert_eq!(
            RunnerError::Configuration("x".into()).kind(),
            ErrorKind::Configuration
        );
        let exec = RunnerError::Execution {
            job_type: JobType::new("digest"),
            source: JobError::new("boom"),
        };
        assert_eq!(exec.kind(), ErrorKind::Execution);
        assert!(exec.to_string().contains("boom"));
        assert_eq!(RunnerError::Closed.kind(), ErrorKind::Dispatch);
    }
}
