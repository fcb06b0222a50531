//! # Event subscribers.
//!
//! [`Subscribe`] implementations receive the executor's [`Event`](crate::Event)s
//! through a [`SubscriberSet`]: one bounded queue and one worker per subscriber.
//!
//! ```text
//! Bus ──► fan-out task (executor runtime) ──► SubscriberSet::emit
//!                                              ├─► [queue] ─► LogWriter
//!                                              └─► [queue] ─► custom (task-queue panel, audit, ...)
//! ```
//!
//! Subscribers are for observation only. Anything that must react to a job's
//! status synchronously uses a [`StatusListener`](crate::StatusListener).

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
