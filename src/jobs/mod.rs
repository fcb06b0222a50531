//! # Jobs: the unit of work and its lifecycle.
//!
//! - [`Job`] / [`JobRef`]: the work itself, implemented by processing modules.
//! - [`JobFn`]: closure-backed job.
//! - [`JobStatus`]: the five-state lifecycle.
//! - [`JobState`]: shared status cell, listener lists, progress and cancellation.
//! - [`JobContext`]: what a running body sees.
//! - [`JobSpec`]: job + state, ready for submission.
//!
//! ```text
//!            ┌──────────── cancel ────────────┐
//!            │                                ▼
//!  WAITING ──┴─► PROCESSING ──┬─► FINISHED   CANCELED
//!                    │        └─► ERROR
//!                    └────────── cancel ──────► CANCELED
//! ```

mod context;
mod job;
mod job_fn;
mod spec;
mod state;
mod status;

pub use context::JobContext;
pub use job::{Job, JobId, JobRef, Priority};
pub use job_fn::JobFn;
pub use spec::JobSpec;
pub use state::JobState;
pub(crate) use state::Scope;
pub use status::JobStatus;
