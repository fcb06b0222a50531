//! # jobvisor
//!
//! **Jobvisor** is the job-control core of a desktop-style application:
//! long-running, cancellable, progress-reporting jobs executed on a bounded
//! worker pool, with observers notified of every status change.
//!
//! A job is a blocking body ([`Job::run`]) paired with a shared
//! [`JobState`]. Bodies poll [`JobContext::is_cancelled`] and report progress;
//! the executor moves the state through its lifecycle and publishes events.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   JobSpec    │   │   JobSpec    │   │   JobSpec    │
//!     │ (job + state)│   │ (job + state)│   │ (job + state)│
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Executor                                                         │
//! │  - JobQueue  (FIFO or priority, optional bound)                   │
//! │  - Registry  (active JobHandles, status → Event)                  │
//! │  - Bus       (broadcast events)                                   │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │   worker 0   │   │   worker 1   │   │   worker N   │   │
//!     │ spawn_block. │   │ spawn_block. │   │ spawn_block. │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ JobState transitions ─► listeners (job, then handle)  │
//!      ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                (capacity: ExecutorConfig::bus_capacity)           │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                            SubscriberSet
//!                  ┌────────────────┼────────────────┐
//!                  ▼                ▼                ▼
//!               sub1.on_event   sub2.on_event    subN.on_event
//! ```
//!
//! ### Lifecycle
//! ```text
//! submit(spec) ──► Waiting ──► queue ──► worker picks ──► Processing ──► run(ctx)
//!                     │                                                   │
//!                     └─ cancel ─► Canceled (skipped)      Ok   ─► Finished
//!                                                          Err  ─► Error(message)
//!                                                          panic ─► Error("job panicked: …")
//!                                                          cancel ─► Canceled
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------------|---------------------------------------------|
//! | **Jobs**          | Define jobs as closures or trait impls with priority.           | [`Job`], [`JobFn`], [`JobSpec`]             |
//! | **State**         | Status machine, cancellation, progress, waiting.                | [`JobState`], [`JobStatus`], [`JobContext`] |
//! | **Listeners**     | Synchronous per-job status notification.                        | [`StatusListener`], [`StatusChange`]        |
//! | **Execution**     | Bounded worker pool, FIFO or priority queue, graceful shutdown. | [`Executor`], [`JobHandle`]                 |
//! | **Groups**        | Fail-fast master/subtask coordination, batch callbacks.         | [`run_group`], [`watch_group`]              |
//! | **Subscriber API**| Asynchronous event fan-out (logging, metrics, UI).              | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for submission, jobs and runtime.                  | [`SubmitError`], [`JobError`], [`RuntimeError`] |
//! | **Configuration** | Centralize executor settings.                                   | [`ExecutorConfig`]                          |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use jobvisor::{Executor, ExecutorConfig, JobContext, JobError, JobFn, JobSpec, JobStatus};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let exec = Executor::new(ExecutorConfig { workers: 2, ..Default::default() })?;
//!
//!     let handle = exec.submit(JobSpec::new(JobFn::arc("Counting", |ctx: &JobContext| {
//!         for i in 0..10 {
//!             ctx.check_cancelled()?;
//!             ctx.set_progress(f64::from(i + 1) / 10.0);
//!         }
//!         Ok::<_, JobError>(())
//!     })))?;
//!
//!     assert_eq!(handle.wait_blocking(), JobStatus::Finished);
//!     exec.shutdown_blocking()?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod group;
mod jobs;
mod listeners;
mod subscribers;

// ---- Public re-exports ----

pub use core::{
    DEFAULT_MAX_WORKERS, Executor, ExecutorBuilder, ExecutorConfig, JobHandle, JobSnapshot,
    QueueOrdering,
};
pub use error::{JobError, RuntimeError, SubmitError};
pub use events::{Bus, Event, EventKind};
pub use group::{GroupCallbacks, GroupWatch, run_group, run_group_async, watch_group};
pub use jobs::{Job, JobContext, JobFn, JobId, JobRef, JobSpec, JobState, JobStatus, Priority};
pub use listeners::{ListenerId, StatusChange, StatusListener};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
