//! # Master/subtask groups.
//!
//! One logical operation fanned out into many parallel subtasks behaves as a
//! fail-fast group: any subtask failing or being canceled stops the master and
//! every sibling, and stopping the master stops every subtask.
//!
//! [`watch_group`] covers batches without a master: callbacks fire once the
//! batch settles.

mod callbacks;
mod coordinator;
mod wire;

pub use callbacks::{GroupCallbacks, GroupWatch, watch_group};
pub use coordinator::{run_group, run_group_async};
