//! # JobQueue: submission queue shared by the workers.
//!
//! ```text
//! submit ──► push_all ──► [ VecDeque<JobSpec> ] ──► pop().await ──► worker
//!                               ▲      │
//!              set_priority ────┘      └── Priority ordering picks the first High
//! ```
//!
//! ## Rules
//! - Admission is all-or-nothing per `push_all` call.
//! - After `close()` nothing is admitted; waiting jobs are still handed out and
//!   `pop()` returns `None` once the queue is empty.
//! - A bounded queue first evicts jobs canceled while waiting before reporting `Full`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::core::config::QueueOrdering;
use crate::error::SubmitError;
use crate::jobs::{JobSpec, Priority};

struct Inner {
    items: VecDeque<JobSpec>,
    closed: bool,
}

pub(crate) struct JobQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: Option<usize>,
    ordering: QueueOrdering,
}

impl JobQueue {
    pub(crate) fn new(capacity: Option<usize>, ordering: QueueOrdering) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            ordering,
        }
    }

    /// Admits every spec or none of them.
    ///
    /// `on_admit` runs for each spec under the queue lock, before any worker can
    /// see it.
    pub(crate) fn push_all(
        &self,
        specs: Vec<JobSpec>,
        mut on_admit: impl FnMut(&JobSpec),
    ) -> Result<(), SubmitError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(SubmitError::Closed);
        }
        if let Some(cap) = self.capacity {
            if inner.items.len() + specs.len() > cap {
                inner.items.retain(|s| !s.state().status().is_terminal());
            }
            if inner.items.len() + specs.len() > cap {
                return Err(SubmitError::Full);
            }
        }

        let n = specs.len();
        for spec in specs {
            on_admit(&spec);
            inner.items.push_back(spec);
        }
        drop(inner);

        for _ in 0..n {
            self.notify.notify_one();
        }
        Ok(())
    }

    /// Next job to run, or `None` once the queue is closed and empty.
    pub(crate) async fn pop(&self) -> Option<JobSpec> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                if let Some(idx) = self.pick(&inner.items) {
                    return inner.items.remove(idx);
                }
                if inner.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Stops admission; jobs already waiting are still handed out.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    fn pick(&self, items: &VecDeque<JobSpec>) -> Option<usize> {
        if items.is_empty() {
            return None;
        }
        match self.ordering {
            QueueOrdering::Fifo => Some(0),
            QueueOrdering::Priority => Some(
                items
                    .iter()
                    .position(|s| s.state().priority() == Priority::High)
                    .unwrap_or(0),
            ),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
