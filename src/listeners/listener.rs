//! # Status listener contract
//!
//! A [`StatusListener`] is called synchronously for every status transition of
//! the job (or handle) it is registered on. Closures `Fn(&StatusChange)` implement
//! the trait, so most callers never name it.
//!
//! ## Contract
//! - Called on whichever thread performed (or is delivering) the transition.
//! - Must not block indefinitely; in particular it must not wait for the
//!   completion of the job it is registered on.
//! - May re-enter the job (e.g. call `cancel()`): nested transitions are queued
//!   and delivered after the current notification returns.
//! - A panic is caught and logged; the remaining listeners still run.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::jobs::{JobId, JobStatus};

/// Global counter for listener registrations.
static LISTENER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Token returned by `add_listener`; pass it to `remove_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        ListenerId(LISTENER_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

/// One observed status transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    /// Job the transition belongs to.
    pub job: JobId,
    /// Status before the transition.
    pub old: JobStatus,
    /// Status after the transition.
    pub new: JobStatus,
    /// Error message, set when `new` is [`JobStatus::Error`].
    pub error: Option<Arc<str>>,
    /// True when this is the catch-up notification delivered to a listener
    /// registered after the job had already terminated (`old == new`).
    pub synthetic: bool,
}

/// Callback invoked with every [`StatusChange`] of a job.
pub trait StatusListener: Send + Sync + 'static {
    /// Handle a single transition.
    fn on_status(&self, change: &StatusChange);
}

impl<F> StatusListener for F
where
    F: Fn(&StatusChange) + Send + Sync + 'static,
{
    fn on_status(&self, change: &StatusChange) {
        self(change)
    }
}
