//! # Completion callbacks for a batch of jobs.
//!
//! [`watch_group`] attaches to already submitted handles and fires exactly one
//! callback once the batch settles. No master job and no waiting thread are
//! involved: the callback runs on the thread that delivered the last relevant
//! status change.
//!
//! ```text
//! subtask terminal ─► listener
//!     ├─ cancel_on_error && Error            → trip: cancel rest, on_error(failed)
//!     ├─ cancel_on_error && Canceled (ext.)  → trip: cancel rest, on_cancel()
//!     └─ last one terminal                   → any Error    → on_error(failed)
//!                                              any Canceled → on_cancel()
//!                                              otherwise    → on_finish()
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::core::JobHandle;
use crate::group::wire::Tripwire;
use crate::jobs::JobStatus;
use crate::listeners::{ListenerId, StatusChange};

type OnDone = Box<dyn FnOnce() + Send>;
type OnError = Box<dyn FnOnce(Vec<JobHandle>) + Send>;

/// Callbacks for [`watch_group`]. Unset callbacks are skipped.
#[derive(Default)]
pub struct GroupCallbacks {
    on_finish: Option<OnDone>,
    on_error: Option<OnError>,
    on_cancel: Option<OnDone>,
}

impl GroupCallbacks {
    /// No callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs when every job finished.
    pub fn on_finish(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_finish = Some(Box::new(f));
        self
    }

    /// Runs with the failed jobs when the batch ends in error.
    pub fn on_error(mut self, f: impl FnOnce(Vec<JobHandle>) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Runs when the batch ends because a job was canceled.
    pub fn on_cancel(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for GroupCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupCallbacks")
            .field("on_finish", &self.on_finish.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .finish()
    }
}

struct Watch {
    wire: Tripwire,
    cancel_on_error: bool,
    remaining: AtomicUsize,
    callbacks: Mutex<Option<GroupCallbacks>>,
    result: Mutex<Option<JobStatus>>,
    done: CancellationToken,
    registrations: Mutex<Vec<(JobHandle, ListenerId)>>,
}

impl Watch {
    fn on_subtask(&self, change: &StatusChange) {
        if !change.new.is_terminal() {
            return;
        }
        if self.cancel_on_error {
            match change.new {
                JobStatus::Error => {
                    self.trip(JobStatus::Error);
                    return;
                }
                JobStatus::Canceled if !self.wire.is_tripped() => {
                    self.trip(JobStatus::Canceled);
                    return;
                }
                _ => {}
            }
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let subtasks = self.wire.subtasks();
            let outcome = if subtasks.iter().any(|h| h.status() == JobStatus::Error) {
                JobStatus::Error
            } else if subtasks.iter().any(|h| h.status() == JobStatus::Canceled) {
                JobStatus::Canceled
            } else {
                JobStatus::Finished
            };
            self.trip(outcome);
        }
    }

    fn trip(&self, outcome: JobStatus) {
        if !self.wire.claim() {
            return;
        }
        if outcome != JobStatus::Finished {
            self.wire.cancel_pending();
        }
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        tracing::debug!(%outcome, jobs = self.wire.len(), "job batch settled");

        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default();
        match outcome {
            JobStatus::Error => {
                if let Some(f) = callbacks.on_error {
                    let failed = self
                        .wire
                        .subtasks()
                        .iter()
                        .filter(|h| h.status() == JobStatus::Error)
                        .cloned()
                        .collect();
                    f(failed);
                }
            }
            JobStatus::Canceled => {
                if let Some(f) = callbacks.on_cancel {
                    f();
                }
            }
            _ => {
                if let Some(f) = callbacks.on_finish {
                    f();
                }
            }
        }

        self.release();
        self.done.cancel();
    }

    fn release(&self) {
        let regs = std::mem::take(
            &mut *self
                .registrations
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for (handle, id) in regs {
            handle.remove_listener(id);
        }
    }
}

/// Handle returned by [`watch_group`].
#[derive(Clone)]
pub struct GroupWatch {
    inner: Arc<Watch>,
}

impl GroupWatch {
    /// Outcome of the batch once a callback fired.
    pub fn outcome(&self) -> Option<JobStatus> {
        *self
            .inner
            .result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves with the outcome after the callback returned.
    pub async fn wait(&self) -> JobStatus {
        self.inner.done.cancelled().await;
        self.outcome().unwrap_or(JobStatus::Finished)
    }

    /// Blocking variant of [`wait`](Self::wait).
    pub fn wait_blocking(&self) -> JobStatus {
        futures::executor::block_on(self.wait())
    }
}

impl std::fmt::Debug for GroupWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupWatch")
            .field("jobs", &self.inner.wire.len())
            .field("outcome", &self.outcome())
            .finish()
    }
}

/// Watches `jobs` and fires one of `callbacks` when the batch settles.
///
/// With `cancel_on_error`, the first failure (or external cancel) cancels the
/// remaining jobs and fires at once; otherwise the batch runs to the end.
/// An empty batch fires `on_finish` immediately.
pub fn watch_group(
    jobs: &[JobHandle],
    cancel_on_error: bool,
    callbacks: GroupCallbacks,
) -> GroupWatch {
    let watch = Arc::new(Watch {
        wire: Tripwire::new(jobs),
        cancel_on_error,
        remaining: AtomicUsize::new(jobs.len()),
        callbacks: Mutex::new(Some(callbacks)),
        result: Mutex::new(None),
        done: CancellationToken::new(),
        registrations: Mutex::new(Vec::with_capacity(jobs.len())),
    });

    if jobs.is_empty() {
        watch.trip(JobStatus::Finished);
        return GroupWatch { inner: watch };
    }

    let mut regs = Vec::with_capacity(jobs.len());
    for handle in jobs {
        let w = Arc::clone(&watch);
        let id = handle.add_listener(move |c: &StatusChange| w.on_subtask(c));
        regs.push((handle.clone(), id));
    }

    {
        let mut stored = watch
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !watch.done.is_cancelled() {
            stored.extend(regs);
            regs = Vec::new();
        }
    }
    for (handle, id) in regs {
        handle.remove_listener(id);
    }

    GroupWatch { inner: watch }
}
