//! # JobContext: the job body's view of its own state.
//!
//! Passed by reference into [`Job::run`](crate::Job::run). It exposes only the
//! operations a job body needs: polling cancellation, reporting progress,
//! renaming itself, settling its own outcome and coordinating subtasks.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::JobHandle;
use crate::error::JobError;
use crate::group;
use crate::jobs::job::JobId;
use crate::jobs::state::JobState;
use crate::jobs::status::JobStatus;

/// Execution context handed to a running job.
#[derive(Clone, Debug)]
pub struct JobContext {
    state: Arc<JobState>,
}

impl JobContext {
    pub(crate) fn new(state: Arc<JobState>) -> Self {
        Self { state }
    }

    /// Identity of the running job.
    pub fn id(&self) -> JobId {
        self.state.id()
    }

    /// True once cancellation was requested; the body should return promptly.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// `Err(JobError::Canceled)` once cancellation was requested.
    ///
    /// Meant for `?` inside loops.
    #[inline]
    pub fn check_cancelled(&self) -> Result<(), JobError> {
        if self.is_cancelled() {
            Err(JobError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Future resolving when the job is canceled.
    pub async fn cancelled(&self) {
        self.state.token().cancelled().await
    }

    /// Clone of the job's cancellation token (e.g. to hand to async I/O).
    pub fn token(&self) -> CancellationToken {
        self.state.token()
    }

    /// Current status of the job.
    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Reports the finished fraction (clamped to `[0, 1]`).
    pub fn set_progress(&self, fraction: f64) {
        self.state.set_progress(fraction);
    }

    /// Replaces the description shown to observers.
    pub fn set_description(&self, description: impl Into<Arc<str>>) {
        self.state.set_description(description);
    }

    /// Marks the job finished early. The executor's own `Finished`
    /// transition after `run` returns becomes a no-op.
    pub fn finish(&self) -> bool {
        self.state.finish()
    }

    /// Marks the job failed with `message`.
    pub fn error(&self, message: impl Into<Arc<str>>) -> bool {
        self.state.error(message)
    }

    /// Shared state of this job.
    pub fn state(&self) -> &Arc<JobState> {
        &self.state
    }

    /// Waits for `subtasks` as the master of a fail-fast group.
    ///
    /// See [`run_group`](crate::run_group) for the semantics. Blocks the
    /// calling worker thread until the group settles.
    pub fn run_group(&self, subtasks: &[JobHandle]) -> JobStatus {
        group::run_group(&self.state, subtasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_cancelled_follows_state() {
        let state = Arc::new(JobState::default());
        let ctx = JobContext::new(Arc::clone(&state));

        state.start();
        assert!(ctx.check_cancelled().is_ok());

        state.cancel();
        assert_eq!(ctx.check_cancelled(), Err(JobError::Canceled));
        assert!(ctx.token().is_cancelled());
    }

    #[test]
    fn description_override_is_visible_on_state() {
        let state = Arc::new(JobState::default());
        let ctx = JobContext::new(Arc::clone(&state));

        ctx.set_description("Aligning 12 of 40 files");
        assert_eq!(
            state.description_override().as_deref(),
            Some("Aligning 12 of 40 files")
        );
    }
}
