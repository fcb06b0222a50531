//! # JobState: per-job status cell and notification hub.
//!
//! Holds everything about a job that is shared between threads:
//! status, error message, progress, description override, priority,
//! cancellation token, and the two listener lists (job and handle scope).
//!
//! ## Transitions
//! ```text
//! set_status(next)
//!   ├─ lock
//!   ├─ illegal?  ─► warn!, return false          (cancel() on terminal: silent)
//!   ├─ status = next; (Canceled ⇒ token.cancel())
//!   ├─ pending.push(change)
//!   └─ drain: while pending non-empty
//!        ├─ pop change, snapshot listeners, unlock
//!        ├─ deliver(job listeners ++ handle listeners)
//!        ├─ publish completion (watch channel)
//!        └─ relock
//! ```
//!
//! ## Rules
//! - Transitions are serialized by the mutex; only one is ever "in flight".
//! - Notifications for one job are delivered in transition order. A transition
//!   made while another thread (or a re-entrant listener) is delivering is
//!   queued and delivered by that thread.
//! - No lock is held while a listener runs.
//! - The completion future resolves only after the terminal notification was
//!   delivered to every listener.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::jobs::job::{JobId, Priority};
use crate::jobs::status::JobStatus;
use crate::listeners::{
    Entry, ListenerId, ListenerSet, StatusChange, StatusListener, deliver,
};

/// Which listener list an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    Job,
    Handle,
}

struct Inner {
    status: JobStatus,
    error: Option<Arc<str>>,
    description: Option<Arc<str>>,
    job_listeners: ListenerSet,
    handle_listeners: ListenerSet,
    pending: VecDeque<StatusChange>,
    delivering: bool,
}

/// Shared status cell of one job.
///
/// Created together with a [`JobSpec`](crate::JobSpec); the executor, the
/// handle and the job body all see the same instance.
pub struct JobState {
    id: JobId,
    inner: Mutex<Inner>,
    token: CancellationToken,
    progress: AtomicU64,
    priority: AtomicU8,
    submitted: AtomicBool,
    done_tx: watch::Sender<JobStatus>,
}

impl JobState {
    /// Creates a fresh `Waiting` state.
    pub fn new(priority: Priority) -> Self {
        let (done_tx, _rx) = watch::channel(JobStatus::Waiting);
        Self {
            id: JobId::next(),
            inner: Mutex::new(Inner {
                status: JobStatus::Waiting,
                error: None,
                description: None,
                job_listeners: ListenerSet::default(),
                handle_listeners: ListenerSet::default(),
                pending: VecDeque::new(),
                delivering: false,
            }),
            token: CancellationToken::new(),
            progress: AtomicU64::new(0f64.to_bits()),
            priority: AtomicU8::new(priority as u8),
            submitted: AtomicBool::new(false),
            done_tx,
        }
    }

    /// Identity of the job.
    #[inline]
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    /// Error message recorded with the `Error` transition, if any.
    pub fn error_message(&self) -> Option<Arc<str>> {
        self.lock().error.clone()
    }

    /// True once the job is `Canceled`.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancellation token tied to this job (cancelled together with the status flip).
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    // ---------------------------
    // Transitions
    // ---------------------------

    /// Performs a transition and notifies listeners.
    ///
    /// Returns `false` (and logs a warning) when the state machine forbids it.
    pub fn set_status(&self, next: JobStatus) -> bool {
        self.transition(next, None, true)
    }

    /// `Waiting → Processing`.
    pub fn start(&self) -> bool {
        self.transition(JobStatus::Processing, None, true)
    }

    /// `Processing → Finished`.
    pub fn finish(&self) -> bool {
        self.transition(JobStatus::Finished, None, true)
    }

    /// `Processing → Error` with a message surfaced verbatim to observers.
    pub fn error(&self, message: impl Into<Arc<str>>) -> bool {
        self.transition(JobStatus::Error, Some(message.into()), true)
    }

    /// `Waiting | Processing → Canceled`; no-op on a terminal job.
    ///
    /// Calling it any number of times yields exactly one `Canceled` transition.
    pub fn cancel(&self) -> bool {
        self.transition(JobStatus::Canceled, None, true)
    }

    /// Worker-side `start()`: a job canceled while queued is skipped quietly.
    pub(crate) fn begin(&self) -> bool {
        self.transition(JobStatus::Processing, None, false)
    }

    /// Applies the outcome of a returned run body.
    ///
    /// A body may already have settled itself (or been canceled) before it
    /// returned, so a terminal status here is expected and not reported.
    pub(crate) fn settle(&self, outcome: Result<(), JobError>) -> JobStatus {
        match outcome {
            Ok(()) => self.transition(JobStatus::Finished, None, false),
            Err(JobError::Canceled) => {
                tracing::debug!(job = self.id.get(), "job stopped on cancellation");
                self.transition(JobStatus::Canceled, None, false)
            }
            Err(JobError::Fail { error }) => {
                tracing::warn!(job = self.id.get(), error = %error, "job failed");
                self.transition(JobStatus::Error, Some(error.into()), false)
            }
            Err(e) => {
                tracing::error!(job = self.id.get(), error = %e, "job fault");
                self.transition(JobStatus::Error, Some(e.to_string().into()), false)
            }
        };
        self.status()
    }

    fn transition(&self, next: JobStatus, error: Option<Arc<str>>, strict: bool) -> bool {
        let mut inner = self.lock();
        let old = inner.status;

        if !old.can_transition_to(next) {
            drop(inner);
            if !strict || (next == JobStatus::Canceled && old.is_terminal()) {
                tracing::debug!(job = self.id.get(), status = %old, to = %next, "transition ignored on settled job");
            } else {
                tracing::warn!(
                    job = self.id.get(),
                    from = %old,
                    to = %next,
                    "illegal job status transition ignored"
                );
            }
            return false;
        }

        inner.status = next;
        if next == JobStatus::Error {
            inner.error = error.clone();
        }
        if next == JobStatus::Canceled {
            self.token.cancel();
        }
        inner.pending.push_back(StatusChange {
            job: self.id,
            old,
            new: next,
            error,
            synthetic: false,
        });
        self.drain(inner);
        true
    }

    /// Delivers queued changes unless another thread is already doing so.
    fn drain<'a>(&'a self, mut inner: MutexGuard<'a, Inner>) {
        if inner.delivering {
            return;
        }
        inner.delivering = true;

        let mut targets: Vec<Entry> = Vec::new();
        while let Some(change) = inner.pending.pop_front() {
            targets.clear();
            inner.job_listeners.snapshot_into(&mut targets);
            inner.handle_listeners.snapshot_into(&mut targets);
            drop(inner);

            deliver(&targets, &change);
            self.done_tx.send_replace(change.new);

            inner = self.lock();
        }
        inner.delivering = false;
    }

    // ---------------------------
    // Listeners
    // ---------------------------

    /// Registers a job-scope listener.
    ///
    /// If the job is already terminal, the listener immediately receives one
    /// synthetic notification with `old == new == current status`.
    pub fn add_listener(&self, listener: impl StatusListener) -> ListenerId {
        self.add_scoped(Scope::Job, Arc::new(listener))
    }

    /// Removes a job-scope listener; `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.remove_scoped(Scope::Job, id)
    }

    pub(crate) fn add_scoped(
        &self,
        scope: Scope,
        listener: Arc<dyn StatusListener>,
    ) -> ListenerId {
        let mut inner = self.lock();
        let id = match scope {
            Scope::Job => inner.job_listeners.add(Arc::clone(&listener)),
            Scope::Handle => inner.handle_listeners.add(Arc::clone(&listener)),
        };

        // A terminal change still queued will reach the new listener anyway.
        let status = inner.status;
        let terminal_queued = inner.pending.iter().any(|c| c.new.is_terminal());
        if !status.is_terminal() || terminal_queued {
            return id;
        }

        let change = StatusChange {
            job: self.id,
            old: status,
            new: status,
            error: inner.error.clone(),
            synthetic: true,
        };
        drop(inner);
        deliver(&[(id, listener)], &change);
        id
    }

    pub(crate) fn remove_scoped(&self, scope: Scope, id: ListenerId) -> bool {
        let mut inner = self.lock();
        match scope {
            Scope::Job => inner.job_listeners.remove(id),
            Scope::Handle => inner.handle_listeners.remove(id),
        }
    }

    // ---------------------------
    // Progress, description, priority
    // ---------------------------

    /// Stores the finished fraction reported by the job body, clamped to `[0, 1]`.
    ///
    /// NaN is ignored. The value is not required to be monotonic.
    pub fn set_progress(&self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        let v = fraction.clamp(0.0, 1.0);
        self.progress.store(v.to_bits(), Ordering::Relaxed);
    }

    /// Last fraction passed to [`set_progress`](Self::set_progress) (0.0 initially).
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Relaxed))
    }

    /// Replaces the description shown to observers.
    pub fn set_description(&self, description: impl Into<Arc<str>>) {
        self.lock().description = Some(description.into());
    }

    /// Description override set by the job body, if any.
    pub fn description_override(&self) -> Option<Arc<str>> {
        self.lock().description.clone()
    }

    /// Current scheduling hint.
    pub fn priority(&self) -> Priority {
        Priority::from_u8(self.priority.load(Ordering::Relaxed))
    }

    /// Changes the scheduling hint; only matters while the job is queued.
    pub fn set_priority(&self, priority: Priority) {
        self.priority.store(priority as u8, Ordering::Relaxed);
    }

    // ---------------------------
    // Completion
    // ---------------------------

    /// Resolves with the terminal status once it has been delivered to all listeners.
    pub async fn wait(&self) -> JobStatus {
        let mut rx = self.done_tx.subscribe();
        match rx.wait_for(|s| s.is_terminal()).await {
            Ok(status) => *status,
            Err(_closed) => self.status(),
        }
    }

    /// Blocking variant of [`wait`](Self::wait).
    ///
    /// Must not be called from inside an async runtime worker; use `wait().await` there.
    pub fn wait_blocking(&self) -> JobStatus {
        futures::executor::block_on(self.wait())
    }

    /// Marks the state as handed to an executor; `false` if it already was.
    pub(crate) fn mark_submitted(&self) -> bool {
        !self.submitted.swap(true, Ordering::AcqRel)
    }

    /// Releases the claim taken by [`mark_submitted`](Self::mark_submitted) after a rejected submission.
    pub(crate) fn unmark_submitted(&self) {
        self.submitted.store(false, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn listener_counts(&self) -> (usize, usize) {
        let inner = self.lock();
        (inner.job_listeners.len(), inner.handle_listeners.len())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new(Priority::Normal)
    }
}

impl std::fmt::Debug for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobState")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("progress", &self.progress())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;

    type Log = Arc<StdMutex<Vec<(JobStatus, JobStatus, bool)>>>;

    fn recorder(state: &JobState) -> Log {
        let log: Log = Arc::new(StdMutex::new(Vec::new()));
        let l = Arc::clone(&log);
        state.add_listener(move |c: &StatusChange| {
            l.lock().unwrap().push((c.old, c.new, c.synthetic));
        });
        log
    }

    #[test]
    fn happy_path_notifies_each_transition() {
        let state = JobState::default();
        let log = recorder(&state);

        assert!(state.start());
        assert!(state.finish());

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (JobStatus::Waiting, JobStatus::Processing, false),
                (JobStatus::Processing, JobStatus::Finished, false),
            ]
        );
        assert_eq!(state.status(), JobStatus::Finished);
    }

    #[test]
    fn terminal_status_never_changes() {
        let state = JobState::default();
        state.start();
        state.error("no scans found");

        assert!(!state.finish());
        assert!(!state.cancel());
        assert!(!state.start());
        assert!(!state.set_status(JobStatus::Waiting));
        assert_eq!(state.status(), JobStatus::Error);
        assert_eq!(state.error_message().as_deref(), Some("no scans found"));
    }

    #[test]
    fn repeated_cancel_yields_one_notification() {
        let state = JobState::default();
        let log = recorder(&state);
        state.start();

        let accepted = (0..10).filter(|_| state.cancel()).count();

        assert_eq!(accepted, 1);
        let canceled = log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, new, _)| *new == JobStatus::Canceled)
            .count();
        assert_eq!(canceled, 1);
        assert!(state.is_cancelled());
        assert!(state.token().is_cancelled());
    }

    #[test]
    fn cancel_from_waiting_is_legal() {
        let state = JobState::default();
        assert!(state.cancel());
        assert_eq!(state.status(), JobStatus::Canceled);
        assert!(!state.start());
    }

    #[test]
    fn late_listener_receives_one_synthetic_notification() {
        let state = JobState::default();
        state.start();
        state.error("disk full");

        let log = recorder(&state);
        let entries = log.lock().unwrap().clone();
        assert_eq!(entries, vec![(JobStatus::Error, JobStatus::Error, true)]);

        // nothing further is ever delivered
        state.cancel();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn listener_added_while_live_gets_no_synthetic() {
        let state = JobState::default();
        state.start();
        let log = recorder(&state);
        assert!(log.lock().unwrap().is_empty());

        state.cancel();
        assert_eq!(
            *log.lock().unwrap(),
            vec![(JobStatus::Processing, JobStatus::Canceled, false)]
        );
    }

    #[test]
    fn reentrant_cancel_is_queued_not_deadlocked() {
        let state = Arc::new(JobState::default());
        let log = recorder(&state);

        let weak = Arc::downgrade(&state);
        state.add_listener(move |c: &StatusChange| {
            if c.new == JobStatus::Processing {
                if let Some(s) = weak.upgrade() {
                    assert!(s.cancel());
                }
            }
        });

        state.start();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (JobStatus::Waiting, JobStatus::Processing, false),
                (JobStatus::Processing, JobStatus::Canceled, false),
            ]
        );
    }

    #[test]
    fn removed_listener_is_not_called() {
        let state = JobState::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let id = state.add_listener(move |_: &StatusChange| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        state.start();
        assert!(state.remove_listener(id));
        state.finish();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn job_listeners_run_before_handle_listeners() {
        let state = JobState::default();
        let order = Arc::new(StdMutex::new(Vec::new()));

        let o = Arc::clone(&order);
        state.add_scoped(
            Scope::Handle,
            Arc::new(move |_: &StatusChange| o.lock().unwrap().push("handle")),
        );
        let o = Arc::clone(&order);
        state.add_listener(move |_: &StatusChange| o.lock().unwrap().push("job"));

        state.start();
        assert_eq!(*order.lock().unwrap(), vec!["job", "handle"]);
    }

    #[test]
    fn progress_is_clamped_and_not_forced() {
        let state = JobState::default();
        assert_eq!(state.progress(), 0.0);

        state.set_progress(0.4);
        state.set_progress(0.2);
        assert_eq!(state.progress(), 0.2);

        state.set_progress(7.0);
        assert_eq!(state.progress(), 1.0);
        state.set_progress(f64::NAN);
        assert_eq!(state.progress(), 1.0);
    }

    #[test]
    fn wait_blocking_returns_terminal_status() {
        let state = Arc::new(JobState::default());
        let s = Arc::clone(&state);
        let t = std::thread::spawn(move || s.wait_blocking());

        state.start();
        state.finish();
        assert_eq!(t.join().unwrap(), JobStatus::Finished);
    }

    #[test]
    fn settle_maps_outcomes() {
        let ok = JobState::default();
        ok.start();
        assert_eq!(ok.settle(Ok(())), JobStatus::Finished);

        let failed = JobState::default();
        failed.start();
        assert_eq!(failed.settle(Err(JobError::fail("bad mz range"))), JobStatus::Error);
        assert_eq!(failed.error_message().as_deref(), Some("bad mz range"));

        let panicked = JobState::default();
        panicked.start();
        let err = JobError::Panicked { message: "boom".into() };
        assert_eq!(panicked.settle(Err(err)), JobStatus::Error);
        assert_eq!(panicked.error_message().as_deref(), Some("job panicked: boom"));
    }

    #[test]
    fn settle_keeps_status_set_by_body_or_cancel() {
        let state = JobState::default();
        state.start();
        state.error("reported by body");
        assert_eq!(state.settle(Ok(())), JobStatus::Error);
        assert_eq!(state.error_message().as_deref(), Some("reported by body"));

        let state = JobState::default();
        state.start();
        state.cancel();
        assert_eq!(state.settle(Ok(())), JobStatus::Canceled);
    }

    #[test]
    fn submission_flag_is_one_shot() {
        let state = JobState::default();
        assert!(state.mark_submitted());
        assert!(!state.mark_submitted());
    }

    #[test]
    fn concurrent_terminal_transitions_have_one_winner() {
        use std::sync::Barrier;

        for _ in 0..200 {
            let state = Arc::new(JobState::default());
            state.start();
            let job_log = recorder(&state);
            let handle_terminals = Arc::new(AtomicUsize::new(0));
            let h = Arc::clone(&handle_terminals);
            state.add_scoped(
                Scope::Handle,
                Arc::new(move |c: &StatusChange| {
                    if c.new.is_terminal() {
                        h.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            );

            let barrier = Arc::new(Barrier::new(3));
            let racers: Vec<std::thread::JoinHandle<(bool, JobStatus)>> = (0..3)
                .map(|n| {
                    let state = Arc::clone(&state);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        match n {
                            0 => (state.finish(), JobStatus::Finished),
                            1 => (state.error("deisotoping failed"), JobStatus::Error),
                            _ => (state.cancel(), JobStatus::Canceled),
                        }
                    })
                })
                .collect();
            let results: Vec<(bool, JobStatus)> =
                racers.into_iter().map(|t| t.join().unwrap()).collect();

            let winners: Vec<JobStatus> = results
                .iter()
                .filter(|(won, _)| *won)
                .map(|(_, s)| *s)
                .collect();
            assert_eq!(winners.len(), 1);
            assert_eq!(state.status(), winners[0]);

            let terminal: Vec<JobStatus> = job_log
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, new, _)| new.is_terminal())
                .map(|(_, new, _)| *new)
                .collect();
            assert_eq!(terminal, vec![winners[0]]);
            assert_eq!(handle_terminals.load(Ordering::SeqCst), 1);
        }
    }
}
