//! # Job lifecycle states.
//!
//! ```text
//! Waiting ──start()──► Processing ──finish()────► Finished
//!    │                     │ ─────error(msg)───► Error
//!    │                     └─────cancel()──────► Canceled
//!    └────────cancel()────────────────────────► Canceled
//! ```
//!
//! `Finished`, `Error` and `Canceled` are terminal: nothing leaves them.

use std::fmt;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Created or queued, not yet picked up by a worker.
    Waiting,
    /// Run body is executing on a worker.
    Processing,
    /// Run body completed normally.
    Finished,
    /// Run body failed (reported error or uncaught fault).
    Error,
    /// Cancellation was requested before the job completed.
    Canceled,
}

impl JobStatus {
    /// True for `Finished`, `Error` and `Canceled`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Error | JobStatus::Canceled
        )
    }

    /// Whether the state machine allows `self → next`.
    ///
    /// # Example
    /// ```
    /// use jobvisor::JobStatus;
    ///
    /// assert!(JobStatus::Waiting.can_transition_to(JobStatus::Canceled));
    /// assert!(!JobStatus::Waiting.can_transition_to(JobStatus::Finished));
    /// assert!(!JobStatus::Canceled.can_transition_to(JobStatus::Canceled));
    /// ```
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Waiting, Processing)
                | (Waiting, Canceled)
                | (Processing, Finished)
                | (Processing, Error)
                | (Processing, Canceled)
        )
    }

    /// Short lowercase label for logs and UIs.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Processing => "processing",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
            JobStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::JobStatus::{self, *};

    const ALL: [JobStatus; 5] = [Waiting, Processing, Finished, Error, Canceled];

    #[test]
    fn terminal_states_have_no_exits() {
        for from in ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn legal_transitions_match_the_table() {
        let legal: Vec<(JobStatus, JobStatus)> = ALL
            .into_iter()
            .flat_map(|a| ALL.into_iter().map(move |b| (a, b)))
            .filter(|(a, b)| a.can_transition_to(*b))
            .collect();

        assert_eq!(
            legal,
            vec![
                (Waiting, Processing),
                (Waiting, Canceled),
                (Processing, Finished),
                (Processing, Error),
                (Processing, Canceled),
            ]
        );
    }

    #[test]
    fn only_waiting_and_processing_are_live() {
        assert!(!Waiting.is_terminal());
        assert!(!Processing.is_terminal());
        assert_eq!(ALL.iter().filter(|s| s.is_terminal()).count(), 3);
    }
}
