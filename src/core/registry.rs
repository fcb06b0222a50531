//! # Registry of active jobs.
//!
//! Holds a [`JobHandle`] for every submitted job that has not reached a
//! terminal status, and turns status transitions into bus events.
//!
//! ## Architecture
//! ```text
//! Executor::submit ─► track(handle) ─► handles[id] = handle
//!                            └──► handle-scope listener (Weak<Registry>)
//!                                   ├─ Processing → JobStarting
//!                                   ├─ Finished   → JobFinished   ┐
//!                                   ├─ Error      → JobFailed     ├─ untrack(id)
//!                                   └─ Canceled   → JobCanceled   ┘
//! ```
//!
//! ## Rules
//! - The listener holds only weak references, so a finished job is not kept
//!   alive by the executor.
//! - Handles are copied out before any job state is read (no lock nesting).

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::core::handle::{JobHandle, JobSnapshot};
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{JobId, JobRef, JobState, JobStatus};
use crate::listeners::{ListenerId, StatusChange};

pub(crate) struct Registry {
    handles: RwLock<HashMap<JobId, JobHandle>>,
    bus: Bus,
}

impl Registry {
    pub(crate) fn new(bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            handles: RwLock::new(HashMap::new()),
            bus,
        })
    }

    /// Registers `handle` and attaches the lifecycle listener.
    pub(crate) fn track(self: &Arc<Self>, handle: &JobHandle) -> ListenerId {
        self.handles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.id(), handle.clone());

        let registry: Weak<Registry> = Arc::downgrade(self);
        let state: Weak<JobState> = Arc::downgrade(handle.state());
        let job: JobRef = Arc::clone(handle.job());

        handle.add_listener(move |change: &StatusChange| {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            let description = match state.upgrade().and_then(|s| s.description_override()) {
                Some(d) => d,
                None => job.description().into(),
            };
            registry.on_status(change, description);
        })
    }

    /// Reverts [`track`](Self::track) for a job that was never admitted.
    pub(crate) fn untrack(&self, handle: &JobHandle, listener: ListenerId) {
        handle.remove_listener(listener);
        self.remove(handle.id());
    }

    fn on_status(&self, change: &StatusChange, description: Arc<str>) {
        let kind = match change.new {
            JobStatus::Waiting => return,
            JobStatus::Processing => EventKind::JobStarting,
            JobStatus::Finished => EventKind::JobFinished,
            JobStatus::Error => EventKind::JobFailed,
            JobStatus::Canceled => EventKind::JobCanceled,
        };

        if change.new.is_terminal() {
            self.remove(change.job);
        }

        let mut ev = Event::new(kind)
            .with_job(change.job)
            .with_description(description);
        if let Some(err) = &change.error {
            ev = ev.with_reason(Arc::clone(err));
        }
        self.bus.publish(ev);
    }

    fn remove(&self, id: JobId) -> Option<JobHandle> {
        self.handles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    pub(crate) fn get(&self, id: JobId) -> Option<JobHandle> {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// All tracked handles, ordered by id (submission order).
    pub(crate) fn handles(&self) -> Vec<JobHandle> {
        let mut out: Vec<JobHandle> = self
            .handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        out.sort_unstable_by_key(JobHandle::id);
        out
    }

    pub(crate) fn snapshots(&self) -> Vec<JobSnapshot> {
        self.handles().iter().map(JobHandle::snapshot).collect()
    }

    pub(crate) fn cancel_all(&self) -> usize {
        self.handles().iter().filter(|h| h.cancel()).count()
    }

    /// Descriptions of jobs currently `Processing`.
    pub(crate) fn running(&self) -> Vec<String> {
        self.handles()
            .into_iter()
            .filter(|h| h.status() == JobStatus::Processing)
            .map(|h| h.description())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}
