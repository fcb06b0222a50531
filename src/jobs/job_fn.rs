//! # Function-backed job (`JobFn`)
//!
//! [`JobFn`] wraps a closure `F: Fn(&JobContext) -> Result<(), JobError>` so that
//! small jobs (and tests) do not need a dedicated type.
//!
//! ## Example
//! ```rust
//! use jobvisor::{JobContext, JobError, JobFn, JobRef};
//!
//! let job: JobRef = JobFn::arc("Export peak list", |ctx: &JobContext| {
//!     for row in 0..100 {
//!         ctx.check_cancelled()?;
//!         ctx.set_progress(row as f64 / 100.0);
//!     }
//!     Ok::<_, JobError>(())
//! });
//!
//! assert_eq!(job.description(), "Export peak list");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::JobError;
use crate::jobs::context::JobContext;
use crate::jobs::job::{Job, Priority};

/// Function-backed job implementation.
#[derive(Debug)]
pub struct JobFn<F> {
    description: Cow<'static, str>,
    priority: Priority,
    f: F,
}

impl<F> JobFn<F> {
    /// Creates a new function-backed job.
    ///
    /// Prefer [`JobFn::arc`] when you immediately need a [`JobRef`](crate::JobRef).
    pub fn new(description: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            description: description.into(),
            priority: Priority::Normal,
            f,
        }
    }

    /// Creates the job and returns it as a shared handle.
    pub fn arc(description: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(description, f))
    }

    /// Returns the job with a different initial priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

impl<F> Job for JobFn<F>
where
    F: Fn(&JobContext) -> Result<(), JobError> + Send + Sync + 'static,
{
    fn description(&self) -> String {
        self.description.to_string()
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        (self.f)(ctx)
    }
}
