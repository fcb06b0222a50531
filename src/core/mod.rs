//! Execution engine: worker pool, submission queue and job handles.
//!
//! The public surface of this module is [`Executor`] (with [`ExecutorBuilder`]
//! and [`ExecutorConfig`]) and [`JobHandle`] / [`JobSnapshot`].
//!
//! Internal modules:
//! - [`queue`]: FIFO / priority submission queue with optional bound;
//! - [`worker`]: worker loop running bodies on the blocking pool;
//! - [`registry`]: active handles, status → event translation;
//! - [`handle`]: caller-side job handle;
//! - [`executor`]: submission, observation and shutdown.

mod builder;
mod config;
mod executor;
mod handle;
mod queue;
mod registry;
mod worker;

pub use builder::ExecutorBuilder;
pub use config::{DEFAULT_MAX_WORKERS, ExecutorConfig, QueueOrdering};
pub use executor::Executor;
pub use handle::{JobHandle, JobSnapshot};
