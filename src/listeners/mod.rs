//! # Status notification hub.
//!
//! Every [`JobState`](crate::JobState) carries two independent listener lists:
//! the job's own, and the one belonging to its [`JobHandle`](crate::JobHandle)
//! (used by the executor and coordinator layer). Both are notified synchronously
//! on every transition, job listeners first.
//!
//! ```text
//! transition (under job mutex) ──► pending queue ──► delivering thread
//!                                                     ├─► job listeners     (registration order)
//!                                                     └─► handle listeners  (registration order)
//! ```
//!
//! Late subscribers: adding a listener after the job reached a terminal state
//! delivers exactly one synthetic [`StatusChange`] with `old == new`.

mod listener;
mod set;

pub use listener::{ListenerId, StatusChange, StatusListener};
pub(crate) use set::{Entry, ListenerSet, deliver};
