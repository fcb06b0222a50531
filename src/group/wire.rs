use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::JobHandle;

/// Once-flag over a set of subtasks.
///
/// The first caller of [`claim`](Self::claim) owns the trip; cancellations it
/// then issues are recognised through [`is_tripped`](Self::is_tripped).
pub(crate) struct Tripwire {
    subtasks: Vec<JobHandle>,
    tripped: AtomicBool,
}

impl Tripwire {
    pub(crate) fn new(subtasks: &[JobHandle]) -> Self {
        Self {
            subtasks: subtasks.to_vec(),
            tripped: AtomicBool::new(false),
        }
    }

    /// `true` for exactly one caller.
    pub(crate) fn claim(&self) -> bool {
        !self.tripped.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Cancels every subtask that is not terminal yet.
    pub(crate) fn cancel_pending(&self) {
        for sub in &self.subtasks {
            sub.cancel();
        }
    }

    /// `"<description>: <error>"` for subtask `index`.
    pub(crate) fn failure_message(&self, index: usize, error: Option<&str>) -> String {
        let description = self
            .subtasks
            .get(index)
            .map(JobHandle::description)
            .unwrap_or_default();
        format!("{description}: {}", error.unwrap_or("unknown error"))
    }

    pub(crate) fn subtasks(&self) -> &[JobHandle] {
        &self.subtasks
    }

    pub(crate) fn len(&self) -> usize {
        self.subtasks.len()
    }
}
