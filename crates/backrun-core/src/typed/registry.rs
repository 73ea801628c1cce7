//! JobRegistry - resolves job type names to callable jobs.
//!
//! Built during initialization (mutable), shared read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use super::job::{DynJob, Job, TypedJob};
use crate::domain::{JobType, RunnerError};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("job type '{0}' is already registered")]
    AlreadyRegistered(JobType),
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: HashMap<JobType, Arc<dyn DynJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    pub fn register<J: Job>(&mut self, job: J) -> Result<(), RegistryError> {
        self.register_dyn(TypedJob::new(job).into_dyn())
    }

    pub fn register_dyn(&mut self, job: Arc<dyn DynJob>) -> Result<(), RegistryError> {
        let job_type = job.job_type();
        if self.jobs.contains_key(&job_type) {
            return Err(RegistryError::AlreadyRegistered(job_type));
        }
        self.jobs.insert(job_type, job);
        Ok(())
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn DynJob>> {
        self.jobs.get(job_type).cloned()
    }

    /// Like [`get`](Self::get), but an unknown name is a resolution error.
    pub fn resolve(&self, job_type: &str) -> Result<Arc<dyn DynJob>, RunnerError> {
        self.get(job_type)
            .ok_or_else(|| RunnerError::Resolution(JobType::new(job_type)))
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.jobs.contains_key(job_type)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Arc<dyn DynJob>> {
        self.jobs.values()
    }

    pub fn registered_types(&self) -> Vec<JobType> {
        let mut types: Vec<JobType> = self.jobs.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
