//! Error types used by the jobvisor runtime and jobs.
//!
//! This module defines three error enums:
//!
//! - [`RuntimeError`]: errors raised by the executor itself (startup, shutdown).
//! - [`SubmitError`]: admission failures returned by [`Executor::submit`](crate::Executor::submit).
//! - [`JobError`]: errors raised by individual job executions.
//!
//! Each type provides helper methods (`as_label`, `as_message`) for logging/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the jobvisor runtime.
///
/// These represent failures in the execution engine itself,
/// such as a shutdown sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some jobs were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Descriptions of jobs that did not finish in time.
        stuck: Vec<String>,
    },

    /// The worker runtime could not be started.
    #[error("failed to start worker runtime: {0}")]
    RuntimeBuild(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use jobvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::RuntimeBuild(_) => "runtime_build_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck jobs={stuck:?}")
            }
            RuntimeError::RuntimeBuild(e) => format!("runtime build failed: {e}"),
        }
    }
}

/// Error returned by [`Executor::submit`](crate::Executor::submit) and
/// [`Executor::submit_all`](crate::Executor::submit_all).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The executor was shut down and no longer accepts jobs.
    #[error("executor is shut down")]
    Closed,

    /// The bounded submission queue is full.
    #[error("submission queue full")]
    Full,

    /// The same job spec was already handed to an executor.
    #[error("job already submitted")]
    AlreadySubmitted,

    /// The job was started outside the executor and is no longer `Waiting`.
    #[error("job is not waiting")]
    NotWaiting,
}

impl SubmitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubmitError::Closed => "submit_closed",
            SubmitError::Full => "submit_full",
            SubmitError::AlreadySubmitted => "submit_duplicate",
            SubmitError::NotWaiting => "submit_not_waiting",
        }
    }
}

/// # Errors produced by job execution.
///
/// A job body returns these to report why it stopped. The worker maps them onto
/// the job's terminal status:
/// - [`JobError::Fail`] and [`JobError::Panicked`] → `Error`
/// - [`JobError::Canceled`] → `Canceled`
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Job execution failed; the message is shown to the user verbatim.
    #[error("{error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Job observed its cancellation signal and stopped early.
    #[error("job cancelled")]
    Canceled,

    /// Job body panicked; the payload text is preserved when it was a string.
    #[error("job panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
}

impl JobError {
    /// Shorthand for [`JobError::Fail`].
    ///
    /// # Example
    /// ```
    /// use jobvisor::JobError;
    ///
    /// let err = JobError::fail("no scans found");
    /// assert_eq!(err.to_string(), "no scans found");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        JobError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Fail { .. } => "job_failed",
            JobError::Canceled => "job_canceled",
            JobError::Panicked { .. } => "job_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            JobError::Fail { error } => format!("error: {error}"),
            JobError::Canceled => "job cancelled".to_string(),
            JobError::Panicked { message } => format!("panic: {message}"),
        }
    }

    /// Builds a [`JobError::Panicked`] from a panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        JobError::Panicked { message }
    }
}
