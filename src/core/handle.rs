//! # JobHandle: caller-side view of a submitted job.
//!
//! Returned by [`Executor::submit`](crate::Executor::submit). A handle is cheap
//! to clone; every clone observes the same [`JobState`].
//!
//! The handle has its own listener list, separate from the job's. Listeners
//! added here are notified after the job's own listeners for the same change.

use std::sync::Arc;

use crate::jobs::{JobId, JobRef, JobSpec, JobState, JobStatus, Priority, Scope};
use crate::listeners::{ListenerId, StatusListener};

/// Point-in-time view of a job for task-queue UIs.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    /// Job identity.
    pub id: JobId,
    /// Current description.
    pub description: String,
    /// Finished fraction in `[0, 1]`.
    pub percentage: f64,
    /// Current status.
    pub status: JobStatus,
    /// Error message (only for `Error`).
    pub error: Option<Arc<str>>,
    /// Current scheduling hint.
    pub priority: Priority,
}

/// Handle to a job accepted by an executor.
#[derive(Clone)]
pub struct JobHandle {
    job: JobRef,
    state: Arc<JobState>,
}

impl JobHandle {
    pub(crate) fn new(spec: &JobSpec) -> Self {
        Self {
            job: Arc::clone(spec.job()),
            state: Arc::clone(spec.state()),
        }
    }

    /// Identity of the job.
    pub fn id(&self) -> JobId {
        self.state.id()
    }

    /// Description override set by the body, else the job's own description.
    pub fn description(&self) -> String {
        match self.state.description_override() {
            Some(d) => d.to_string(),
            None => self.job.description(),
        }
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Failure message, set only once the job ended in `Error`.
    pub fn error_message(&self) -> Option<Arc<str>> {
        self.state.error_message()
    }

    /// Finished fraction in `[0, 1]`; `0.0` while the job is still waiting.
    ///
    /// Safe to call concurrently with the running body. The value is whatever
    /// the job reports; it is not forced to `1.0` on completion.
    pub fn finished_percentage(&self) -> f64 {
        if self.state.status() == JobStatus::Waiting {
            return 0.0;
        }
        let v = self
            .job
            .finished_percentage()
            .unwrap_or_else(|| self.state.progress());
        if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
    }

    /// Current scheduling hint.
    pub fn priority(&self) -> Priority {
        self.state.priority()
    }

    /// Re-ranks the job if it is still waiting (see [`QueueOrdering::Priority`](crate::QueueOrdering::Priority)).
    pub fn set_priority(&self, priority: Priority) {
        self.state.set_priority(priority);
    }

    /// Requests cancellation. Idempotent; a no-op on a terminal job.
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }

    /// Registers a handle-scope listener.
    ///
    /// A listener added after the job terminated receives one synthetic
    /// notification carrying the terminal status.
    pub fn add_listener(&self, listener: impl StatusListener) -> ListenerId {
        self.state.add_scoped(Scope::Handle, Arc::new(listener))
    }

    /// Removes a handle-scope listener; `false` if it was not registered here.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.state.remove_scoped(Scope::Handle, id)
    }

    /// Resolves with the terminal status after all listeners were notified.
    ///
    /// Combine with `tokio::time::timeout` for a bounded wait; cancel the
    /// handle when the timer wins.
    pub async fn wait(&self) -> JobStatus {
        self.state.wait().await
    }

    /// Blocking variant of [`wait`](Self::wait) for non-async callers.
    pub fn wait_blocking(&self) -> JobStatus {
        self.state.wait_blocking()
    }

    pub(crate) fn job(&self) -> &JobRef {
        &self.job
    }

    /// Shared state of the job.
    pub fn state(&self) -> &Arc<JobState> {
        &self.state
    }

    /// Point-in-time view for display.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id(),
            description: self.description(),
            percentage: self.finished_percentage(),
            status: self.status(),
            error: self.error_message(),
            priority: self.priority(),
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use crate::jobs::{Job, JobContext, JobFn};
    use crate::listeners::StatusChange;
    use std::sync::Mutex;

    struct FixedProgress;

    impl Job for FixedProgress {
        fn description(&self) -> String {
            "fixed".into()
        }
        fn finished_percentage(&self) -> Option<f64> {
            Some(0.75)
        }
        fn run(&self, _ctx: &JobContext) -> Result<(), JobError> {
            Ok(())
        }
    }

    #[test]
    fn percentage_is_zero_while_waiting_and_not_forced_on_finish() {
        let spec = JobSpec::new(JobFn::arc("peaks", |_: &JobContext| Ok::<_, JobError>(())));
        let handle = JobHandle::new(&spec);

        spec.state().set_progress(0.3);
        assert_eq!(handle.finished_percentage(), 0.0);

        spec.state().start();
        spec.state().set_progress(0.4);
        assert_eq!(handle.finished_percentage(), 0.4);

        spec.state().finish();
        assert_eq!(handle.finished_percentage(), 0.4);
    }

    #[test]
    fn job_reported_percentage_wins() {
        let spec = JobSpec::new(Arc::new(FixedProgress));
        let handle = JobHandle::new(&spec);
        spec.state().start();
        spec.state().set_progress(0.1);
        assert_eq!(handle.finished_percentage(), 0.75);
    }

    #[test]
    fn handle_listeners_are_separate_from_job_listeners() {
        let spec = JobSpec::new(JobFn::arc("align", |_: &JobContext| Ok::<_, JobError>(())));
        let handle = JobHandle::new(&spec);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        let id = handle.add_listener(move |c: &StatusChange| s.lock().unwrap().push(c.new));

        // not in the job-scope list
        assert!(!spec.state().remove_listener(id));

        handle.cancel();
        assert_eq!(*seen.lock().unwrap(), vec![JobStatus::Canceled]);
        assert!(handle.remove_listener(id));
    }

    #[test]
    fn snapshot_reflects_state() {
        let spec = JobSpec::new(JobFn::arc("export", |_: &JobContext| Ok::<_, JobError>(())));
        let handle = JobHandle::new(&spec);
        spec.state().start();
        spec.state().set_description("Export 3 of 9");
        spec.state().error("write failed");

        let snap = handle.snapshot();
        assert_eq!(snap.id, handle.id());
        assert_eq!(snap.description, "Export 3 of 9");
        assert_eq!(snap.status, JobStatus::Error);
        assert_eq!(snap.error.as_deref(), Some("write failed"));
        assert_eq!(snap.priority, Priority::Normal);
    }
}
