//! # Job specification.
//!
//! [`JobSpec`] couples a [`JobRef`] with the [`JobState`] it will run under.
//! The state exists before submission, so listeners can be attached (and
//! subtask handles collected) before the job ever reaches a worker.
//!
//! A spec may be submitted at most once; a second submission is rejected with
//! [`SubmitError::AlreadySubmitted`](crate::SubmitError::AlreadySubmitted).

use std::sync::Arc;

use crate::jobs::job::{JobRef, Priority};
use crate::jobs::state::JobState;

/// Job plus its shared state, ready for submission.
#[derive(Clone)]
pub struct JobSpec {
    job: JobRef,
    state: Arc<JobState>,
}

impl JobSpec {
    /// Wraps `job` in a fresh `Waiting` state using the job's own priority.
    pub fn new(job: JobRef) -> Self {
        let state = Arc::new(JobState::new(job.priority()));
        Self { job, state }
    }

    /// Overrides the initial priority.
    pub fn with_priority(self, priority: Priority) -> Self {
        self.state.set_priority(priority);
        self
    }

    /// Shared state (attach listeners here before submitting).
    pub fn state(&self) -> &Arc<JobState> {
        &self.state
    }

    /// The job itself.
    pub fn job(&self) -> &JobRef {
        &self.job
    }

    /// Effective description: the body's override if set, otherwise the job's.
    pub fn description(&self) -> String {
        match self.state.description_override() {
            Some(d) => d.to_string(),
            None => self.job.description(),
        }
    }
}

impl std::fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSpec")
            .field("id", &self.state.id())
            .field("description", &self.description())
            .finish()
    }
}
