//! # Worker loop.
//!
//! ```text
//! loop {
//!   ├─► crew above target?           (yes ⇒ retire)
//!   ├─► queue.pop().await            (None ⇒ closed and drained ⇒ exit)
//!   ├─► state.begin()                (false ⇒ canceled while queued ⇒ skip)
//!   ├─► spawn_blocking(job.run(&ctx))
//!   │       ├─ Ok(Ok(()))          ─► Finished (unless already terminal)
//!   │       ├─ Ok(Err(Canceled))   ─► Canceled
//!   │       ├─ Ok(Err(e))          ─► Error(e)
//!   │       └─ Err(panic)          ─► Error("job panicked: ...")
//!   └─► next
//! }
//! ```
//!
//! ## Rules
//! - A worker runs at most one body at a time.
//! - A body that panics or fails never takes its worker down.
//! - The [`Crew`] counts live worker loops. Shutdown waits for that count to
//!   reach zero, so every call observes the workers that are really running.
//! - Shrinking the crew retires idle workers first; a busy worker retires after
//!   its current job.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

use crate::core::queue::JobQueue;
use crate::error::JobError;
use crate::jobs::{JobContext, JobSpec, JobStatus};

/// Live worker loops and the size they should converge to.
pub(crate) struct Crew {
    alive: AtomicUsize,
    target: AtomicUsize,
    next_index: AtomicUsize,
    idle: Notify,
    shrink: Notify,
}

impl Crew {
    pub(crate) fn new(target: usize) -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicUsize::new(0),
            target: AtomicUsize::new(target),
            next_index: AtomicUsize::new(0),
            idle: Notify::new(),
            shrink: Notify::new(),
        })
    }

    /// Counts a new worker as alive. Call before spawning its loop.
    pub(crate) fn enlist(self: &Arc<Self>) -> Seat {
        self.alive.fetch_add(1, Ordering::AcqRel);
        Seat {
            index: self.next_index.fetch_add(1, Ordering::Relaxed),
            crew: Arc::clone(self),
            retired: false,
        }
    }

    pub(crate) fn alive(&self) -> usize {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn target(&self) -> usize {
        self.target.load(Ordering::Acquire)
    }

    /// Sets the desired size and wakes idle workers when it shrank.
    pub(crate) fn set_target(&self, target: usize) {
        let old = self.target.swap(target, Ordering::AcqRel);
        if target < old {
            self.shrink.notify_waiters();
        }
    }

    /// Resolves once no worker loop is running.
    pub(crate) async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.alive() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn try_retire(&self) -> bool {
        let mut alive = self.alive();
        loop {
            if alive <= self.target() {
                return false;
            }
            match self.alive.compare_exchange(alive, alive - 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return true,
                Err(now) => alive = now,
            }
        }
    }

    fn left(&self) {
        if self.alive() == 0 {
            self.idle.notify_waiters();
        }
    }
}

/// One enlisted worker. Dropping it (loop exit, abort or panic) releases the slot.
pub(crate) struct Seat {
    index: usize,
    crew: Arc<Crew>,
    retired: bool,
}

impl Seat {
    fn try_retire(&mut self) -> bool {
        self.retired = self.crew.try_retire();
        self.retired
    }
}

impl Drop for Seat {
    fn drop(&mut self) {
        if !self.retired {
            self.crew.alive.fetch_sub(1, Ordering::AcqRel);
        }
        self.crew.left();
    }
}

pub(crate) async fn worker_loop(mut seat: Seat, queue: Arc<JobQueue>) {
    let index = seat.index;
    let crew = Arc::clone(&seat.crew);
    tracing::debug!(worker = index, "worker started");
    loop {
        let shrink = crew.shrink.notified();
        tokio::pin!(shrink);
        shrink.as_mut().enable();
        if seat.try_retire() {
            tracing::debug!(worker = index, "worker retired");
            return;
        }

        tokio::select! {
            next = queue.pop() => match next {
                Some(spec) => run_one(spec).await,
                None => break,
            },
            _ = &mut shrink => {}
        }
    }
    tracing::debug!(worker = index, "worker stopped");
}

async fn run_one(spec: JobSpec) {
    let state = Arc::clone(spec.state());
    if !state.begin() {
        return;
    }

    let job = Arc::clone(spec.job());
    let ctx = JobContext::new(Arc::clone(&state));
    let outcome = match tokio::task::spawn_blocking(move || job.run(&ctx)).await {
        Ok(res) => res,
        Err(join) if join.is_panic() => Err(JobError::from_panic(join.into_panic())),
        Err(_) => Err(JobError::Canceled),
    };

    let status = state.settle(outcome);
    tracing::debug!(job = state.id().get(), %status, "job settled");
}

/// Runs `spec` on the calling thread with the same status handling as a worker.
pub(crate) fn run_inline(spec: &JobSpec) -> JobStatus {
    let state = spec.state();
    if !state.begin() {
        return state.status();
    }

    let ctx = JobContext::new(Arc::clone(state));
    let outcome = match catch_unwind(AssertUnwindSafe(|| spec.job().run(&ctx))) {
        Ok(res) => res,
        Err(panic) => Err(JobError::from_panic(panic)),
    };

    let status = state.settle(outcome);
    tracing::debug!(job = state.id().get(), %status, "job settled inline");
    status
}
