//! # ListenerSet: ordered, panic-isolated callback list
//!
//! Storage half of the notification hub. The set itself is not synchronized:
//! it lives inside the owning [`JobState`](crate::JobState) mutex, which also
//! decides *when* to deliver. Delivery always happens on a snapshot, outside
//! that lock.
//!
//! ## Rules
//! - Delivery order is registration order.
//! - A panicking listener is caught and logged (`tracing::error!`); the
//!   remaining listeners still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::listener::{ListenerId, StatusChange, StatusListener};

/// Registered listener with its removal token.
pub(crate) type Entry = (ListenerId, Arc<dyn StatusListener>);

/// Registration-ordered list of listeners.
#[derive(Default)]
pub(crate) struct ListenerSet {
    entries: Vec<Entry>,
}

impl ListenerSet {
    /// Appends a listener and returns its id.
    pub(crate) fn add(&mut self, listener: Arc<dyn StatusListener>) -> ListenerId {
        let id = ListenerId::next();
        self.entries.push((id, listener));
        id
    }

    /// Removes a listener; `false` if the id is unknown.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(lid, _)| *lid != id);
        self.entries.len() != before
    }

    /// Appends clones of all entries to `out` (in order).
    pub(crate) fn snapshot_into(&self, out: &mut Vec<Entry>) {
        out.extend(self.entries.iter().cloned());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Invokes every listener with `change`, isolating panics per listener.
pub(crate) fn deliver(targets: &[Entry], change: &StatusChange) {
    for (id, listener) in targets {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.on_status(change))) {
            let info = if let Some(msg) = panic.downcast_ref::<&'static str>() {
                (*msg).to_string()
            } else if let Some(msg) = panic.downcast_ref::<String>() {
                msg.clone()
            } else {
                "unknown panic".to_string()
            };
            tracing::error!(
                job = change.job.get(),
                listener = ?id,
                old = %change.old,
                new = %change.new,
                panic = %info,
                "status listener panicked"
            );
        }
    }
}
