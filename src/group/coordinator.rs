//! # Fail-fast master/subtask coordination.
//!
//! A master job that splits its work into `K` subtasks hands their handles to
//! [`run_group`] and blocks until the group settles.
//!
//! ```text
//!                  ┌──────────── master listener ────────────┐
//!  master ─────────┤  Canceled | Error  → trip(MasterStopped) │
//!                  └─────────────────────────────────────────┘
//!  subtask i ── handle listener:
//!      Error              → trip(SubtaskFailed("<desc>: <err>"))
//!      Canceled, untripped → trip(SubtaskCanceled)             (external cancel)
//!      Canceled, tripped   → ignored                           (caused by the group)
//!
//!  trip(outcome)   (once)
//!      ├─ cancel every non-terminal subtask
//!      ├─ SubtaskFailed   → master.error(msg)
//!      ├─ SubtaskCanceled → master.cancel()
//!      └─ wake the waiting caller
//! ```
//!
//! ## Rules
//! - The group trips at most once; cancellations it causes never re-trigger it.
//! - The caller waits for the subtasks in order, or returns as soon as the
//!   group trips. Stragglers are signalled, not awaited.
//! - The coordinator never finishes the master; the master's own run body
//!   returning does that.
//! - Every listener it registered is removed before it returns.
//! - A master blocked here occupies a worker: the pool must be larger than the
//!   nesting depth of coordinator jobs.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio_util::sync::CancellationToken;

use crate::core::JobHandle;
use crate::error::JobError;
use crate::jobs::{JobState, JobStatus};
use crate::group::wire::Tripwire;
use crate::listeners::{ListenerId, StatusChange};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Trip {
    MasterStopped,
    SubtaskFailed(String),
    SubtaskCanceled,
}

struct Group {
    master: Weak<JobState>,
    wire: Tripwire,
    outcome: Mutex<Option<Trip>>,
    signal: CancellationToken,
}

impl Group {
    fn trip(&self, outcome: Trip) {
        if !self.wire.claim() {
            return;
        }
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome.clone());

        let master = self.master.upgrade();
        tracing::debug!(
            master = master.as_ref().map(|m| m.id().get()),
            outcome = ?outcome,
            subtasks = self.wire.len(),
            "job group tripped"
        );

        self.wire.cancel_pending();

        if let Some(master) = master {
            match outcome {
                Trip::SubtaskFailed(message) => {
                    master.settle(Err(JobError::fail(message)));
                }
                Trip::SubtaskCanceled => {
                    master.cancel();
                }
                Trip::MasterStopped => {}
            }
        }

        self.signal.cancel();
    }

    fn on_master(&self, change: &StatusChange) {
        if matches!(change.new, JobStatus::Canceled | JobStatus::Error) {
            self.trip(Trip::MasterStopped);
        }
    }

    fn on_subtask(&self, index: usize, change: &StatusChange) {
        match change.new {
            JobStatus::Error => {
                let message = self.wire.failure_message(index, change.error.as_deref());
                self.trip(Trip::SubtaskFailed(message));
            }
            JobStatus::Canceled if !self.wire.is_tripped() => {
                self.trip(Trip::SubtaskCanceled);
            }
            _ => {}
        }
    }

    fn outcome(&self) -> Option<Trip> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Removes the group's listeners on every exit path.
struct Registrations {
    master: Arc<JobState>,
    master_listener: Option<ListenerId>,
    subtasks: Vec<(JobHandle, ListenerId)>,
}

impl Drop for Registrations {
    fn drop(&mut self) {
        if let Some(id) = self.master_listener.take() {
            self.master.remove_listener(id);
        }
        for (handle, id) in self.subtasks.drain(..) {
            handle.remove_listener(id);
        }
    }
}

/// Blocks until every subtask is terminal or the group trips.
///
/// Returns the master's status when the group drove it to `Error` or
/// `Canceled` (or found it there), otherwise `Finished`.
///
/// Must not be called from inside an async runtime worker; use
/// [`run_group_async`] there. From a job body, prefer
/// [`JobContext::run_group`](crate::JobContext::run_group).
pub fn run_group(master: &Arc<JobState>, subtasks: &[JobHandle]) -> JobStatus {
    futures::executor::block_on(run_group_async(master, subtasks))
}

/// Async variant of [`run_group`].
pub async fn run_group_async(master: &Arc<JobState>, subtasks: &[JobHandle]) -> JobStatus {
    if subtasks.is_empty() {
        return JobStatus::Finished;
    }

    let group = Arc::new(Group {
        master: Arc::downgrade(master),
        wire: Tripwire::new(subtasks),
        outcome: Mutex::new(None),
        signal: CancellationToken::new(),
    });

    let mut regs = Registrations {
        master: Arc::clone(master),
        master_listener: None,
        subtasks: Vec::with_capacity(subtasks.len()),
    };

    let g = Arc::clone(&group);
    regs.master_listener = Some(master.add_listener(move |c: &StatusChange| g.on_master(c)));

    for (index, handle) in subtasks.iter().enumerate() {
        let g = Arc::clone(&group);
        let id = handle.add_listener(move |c: &StatusChange| g.on_subtask(index, c));
        regs.subtasks.push((handle.clone(), id));
    }

    let all_done = async {
        for handle in subtasks {
            handle.wait().await;
        }
    };
    tokio::select! {
        biased;
        _ = group.signal.cancelled() => {}
        _ = all_done => {}
    }
    drop(regs);

    match master.status() {
        s @ (JobStatus::Error | JobStatus::Canceled) => s,
        _ => match group.outcome() {
            None | Some(Trip::MasterStopped) => JobStatus::Finished,
            Some(Trip::SubtaskFailed(_)) => JobStatus::Error,
            Some(Trip::SubtaskCanceled) => JobStatus::Canceled,
        },
    }
}
