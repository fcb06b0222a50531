//! # Runtime events emitted by the executor.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Job lifecycle events**: submission, start and the three terminal outcomes
//! - **Subscriber events**: overflow and panics inside subscriber workers
//! - **Shutdown events**: shutdown request and its grace-period outcome
//!
//! The [`Event`] struct carries additional metadata such as timestamps, job id,
//! description and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use jobvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::JobFailed)
//!     .with_description("Deisotoping")
//!     .with_reason("no isotope pattern");
//!
//! assert_eq!(ev.kind, EventKind::JobFailed);
//! assert_eq!(ev.description.as_deref(), Some("Deisotoping"));
//! assert_eq!(ev.reason.as_deref(), Some("no isotope pattern"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::jobs::JobId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: "full" or "closed"
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested; admission is closed.
    ShutdownRequested,

    /// All workers stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some jobs were still running.
    ///
    /// Sets:
    /// - `reason`: descriptions of the stuck jobs
    GraceExceeded,

    // === Job lifecycle events ===
    /// Job accepted into the queue.
    ///
    /// Sets:
    /// - `job`, `description`
    JobSubmitted,

    /// Job picked up by a worker (`Processing`).
    ///
    /// Sets:
    /// - `job`, `description`
    JobStarting,

    /// Job completed normally (`Finished`).
    ///
    /// Sets:
    /// - `job`, `description`
    JobFinished,

    /// Job failed (`Error`).
    ///
    /// Sets:
    /// - `job`, `description`
    /// - `reason`: error message
    JobFailed,

    /// Job was canceled, either while queued or while running.
    ///
    /// Sets:
    /// - `job`, `description`
    JobCanceled,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Job the event refers to, if applicable.
    pub job: Option<JobId>,
    /// Job description at the time of the event.
    pub description: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Subscriber name for subscriber events.
    pub subscriber: Option<&'static str>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            job: None,
            description: None,
            reason: None,
            subscriber: None,
        }
    }

    /// Attaches a job id.
    #[inline]
    pub fn with_job(mut self, job: JobId) -> Self {
        self.job = Some(job);
        self
    }

    /// Attaches a job description.
    #[inline]
    pub fn with_description(mut self, description: impl Into<Arc<str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow).with_reason(reason);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// True for events the subscriber machinery produces about itself.
    ///
    /// These are never fed back into the subscriber queues.
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
