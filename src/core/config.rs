//! # Executor configuration.
//!
//! Provides [`ExecutorConfig`], the settings consumed by
//! [`Executor::builder`](crate::Executor::builder).
//!
//! ## Sentinel values
//! - `workers = 0` → one worker per available CPU (`std::thread::available_parallelism`)
//! - `queue_capacity = 0` → unbounded submission queue
//! - `max_workers = 0` → resize ceiling of [`DEFAULT_MAX_WORKERS`] (or `workers`, if larger)

use std::num::NonZeroUsize;
use std::time::Duration;

/// Resize ceiling used when `max_workers` is `0`.
pub const DEFAULT_MAX_WORKERS: usize = 256;

/// Order in which waiting jobs leave the submission queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueueOrdering {
    /// Strict submission order.
    #[default]
    Fifo,
    /// `High` priority jobs first, submission order within a priority.
    ///
    /// Priority is read when a worker dequeues, so
    /// [`JobHandle::set_priority`](crate::JobHandle::set_priority) re-ranks a
    /// job that is still waiting.
    Priority,
}

/// Configuration of an [`Executor`](crate::Executor).
///
/// ## Field semantics
/// - `workers`: initial size of the worker pool (`0` = available parallelism)
/// - `max_workers`: upper bound for [`Executor::set_workers`](crate::Executor::set_workers)
/// - `queue_capacity`: max waiting jobs (`0` = unbounded)
/// - `ordering`: dequeue policy
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `grace`: default wait used by [`Executor::shutdown`](crate::Executor::shutdown)
///
/// ## Notes
/// A job that blocks its worker on [`run_group`](crate::run_group) occupies one
/// worker for the whole group. `workers` must exceed the nesting depth of such
/// coordinator jobs, otherwise subtasks can never be scheduled.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Number of concurrently running jobs at start.
    pub workers: usize,

    /// Largest pool size reachable by resizing; also the blocking thread cap.
    pub max_workers: usize,

    /// Maximum number of jobs waiting in the queue.
    ///
    /// - `0` = unbounded
    /// - `n > 0` = `submit` returns [`SubmitError::Full`](crate::SubmitError::Full)
    ///   once `n` jobs are waiting
    pub queue_capacity: usize,

    /// Dequeue policy for waiting jobs.
    pub ordering: QueueOrdering,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Maximum time `shutdown()` waits for running jobs before giving up.
    pub grace: Duration,
}

impl ExecutorConfig {
    /// Effective worker count (never zero).
    #[inline]
    pub fn worker_count(&self) -> usize {
        match self.workers {
            0 => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            n => n,
        }
    }

    /// Effective resize ceiling (never below [`worker_count`](Self::worker_count)).
    #[inline]
    pub fn worker_ceiling(&self) -> usize {
        let cap = match self.max_workers {
            0 => DEFAULT_MAX_WORKERS,
            n => n,
        };
        cap.max(self.worker_count())
    }

    /// Returns the queue bound as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` waiting jobs
    #[inline]
    pub fn queue_limit(&self) -> Option<usize> {
        if self.queue_capacity == 0 {
            None
        } else {
            Some(self.queue_capacity)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ExecutorConfig {
    /// Default configuration:
    ///
    /// - `workers = 0` (one per CPU)
    /// - `max_workers = 0` ([`DEFAULT_MAX_WORKERS`])
    /// - `queue_capacity = 0` (unbounded)
    /// - `ordering = Fifo`
    /// - `bus_capacity = 1024`
    /// - `grace = 30s`
    fn default() -> Self {
        Self {
            workers: 0,
            max_workers: 0,
            queue_capacity: 0,
            ordering: QueueOrdering::Fifo,
            bus_capacity: 1024,
            grace: Duration::from_secs(30),
        }
    }
}
