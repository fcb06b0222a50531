//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so that events can be published
//! from any thread. Status listeners run on whichever thread performed the
//! transition (often a blocking pool thread), so publishing must never await.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                    Receivers:
//!   status listener (per job) ──┐
//!   Executor::submit          ──┼──► Bus ──┬─► fan-out task ──► SubscriberSet
//!   Executor::shutdown        ──┤          └─► Executor::subscribe() (callers)
//!   SubscriberSet workers     ──┘
//! ```
//!
//! ## Rules
//! - `publish()` is synchronous and never blocks.
//! - One ring buffer of `capacity` events is shared by all receivers; a receiver
//!   that falls behind gets `RecvError::Lagged(n)` and skips the oldest `n`.
//! - Events sent while nobody is subscribed are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable broadcast handle for runtime events.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus whose ring buffer holds `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Sends `ev` to every current receiver; a no-op without receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// New independent receiver observing events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
