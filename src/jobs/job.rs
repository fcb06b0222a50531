//! # Job abstraction.
//!
//! This module defines the [`Job`] trait implemented by processing modules.
//! The common handle type is [`JobRef`], an `Arc<dyn Job>` suitable for sharing
//! between the caller, the executor and observers.
//!
//! A job receives a [`JobContext`] and should check
//! [`JobContext::is_cancelled`] at least once per unit of work, returning
//! promptly once cancellation is observed.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::JobError;
use crate::jobs::context::JobContext;

/// Global counter for job identities.
static JOB_SEQ: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a job, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub(crate) fn next() -> Self {
        JobId(JOB_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value (for logs and UI keys).
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Scheduling hint used by [`QueueOrdering::Priority`](crate::QueueOrdering::Priority).
///
/// Only jobs still waiting in the queue are affected; a running job is never
/// preempted or reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    /// Regular processing work.
    #[default]
    Normal = 0,
    /// Interactive work (e.g. a plot refresh) that should jump the queue.
    High = 1,
}

impl Priority {
    pub(crate) fn from_u8(v: u8) -> Self {
        if v == Priority::High as u8 {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}

/// # Cancellable, progress-reporting unit of work.
///
/// `run` executes on a worker thread of the [`Executor`](crate::Executor) and
/// may block that thread for as long as the work takes. Status transitions
/// into and out of `Processing` are handled by the executor; a body may still
/// call [`JobContext::error`] or [`JobContext::finish`] itself.
///
/// # Example
/// ```
/// use jobvisor::{Job, JobContext, JobError};
///
/// struct BaselineCorrection {
///     scans: usize,
/// }
///
/// impl Job for BaselineCorrection {
///     fn description(&self) -> String {
///         format!("Baseline correction of {} scans", self.scans)
///     }
///
///     fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
///         for i in 0..self.scans {
///             ctx.check_cancelled()?;
///             // correct scan i ...
///             ctx.set_progress((i + 1) as f64 / self.scans as f64);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Job: Send + Sync + 'static {
    /// Human-readable description shown by the UI.
    fn description(&self) -> String;

    /// Self-reported finished fraction in `[0, 1]`.
    ///
    /// `None` (default) means the executor reports the value last passed to
    /// [`JobContext::set_progress`].
    fn finished_percentage(&self) -> Option<f64> {
        None
    }

    /// Initial scheduling hint.
    fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Executes the work until completion, failure or cancellation.
    fn run(&self, ctx: &JobContext) -> Result<(), JobError>;
}

/// Shared handle to a job.
pub type JobRef = Arc<dyn Job>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_ordered() {
        let a = JobId::next();
        let b = JobId::next();
        assert!(b > a);
        assert_eq!(a.to_string(), format!("job-{}", a.get()));
    }

    #[test]
    fn priority_round_trips_through_u8() {
        assert_eq!(Priority::from_u8(Priority::High as u8), Priority::High);
        assert_eq!(Priority::from_u8(Priority::Normal as u8), Priority::Normal);
        assert_eq!(Priority::from_u8(200), Priority::Normal);
        assert!(Priority::High > Priority::Normal);
    }
}
