//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the executor, its job
//! status listeners and the subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! Events are an observability side channel. Job control itself (status,
//! cancellation, groups) never depends on them; see [`StatusListener`](crate::StatusListener).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
