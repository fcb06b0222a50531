//! # Executor: bounded worker pool for jobs.
//!
//! The [`Executor`] owns a private multi-threaded tokio runtime. `N` async
//! worker loops pull jobs from the shared [`JobQueue`] and run each body on the
//! runtime's blocking pool, so at most `N` bodies run at once. The pool can be
//! resized up to [`ExecutorConfig::worker_ceiling`].
//!
//! ## Architecture
//! ```text
//! submit(spec) ─► mark submitted ─► Registry::track ─► JobQueue::push_all ─► JobSubmitted
//!                                                            │
//!                         ┌──────────────┬───────────────────┘
//!                         ▼              ▼
//!                     worker 0  ...  worker N-1     (async loops on the executor runtime, counted by the crew)
//!                         │              │
//!                   spawn_blocking(job.run(&ctx))   (one body per worker loop)
//!                         │
//!                   JobState transitions ─► listeners ─► Registry ─► Bus ─► SubscriberSet
//!
//! Shutdown path:
//!   shutdown()             ─► queue closed, ShutdownRequested
//!   shutdown_with_grace(g) ─► shutdown() + wait up to g for the crew to empty:
//!                               ├─ all exited  → AllStoppedWithin, Ok(())
//!                               └─ timeout     → GraceExceeded, Err(RuntimeError::GraceExceeded)
//!
//! Side paths:
//!   run_blocking(spec)     ─► same status handling, body runs on the caller's thread
//!   set_workers(n)         ─► spawn loops, or retire them as they become idle
//! ```
//!
//! ## Rules
//! - `submit` never blocks and never runs job code on the caller's thread.
//! - Only `Waiting` (or already terminal) specs are admitted; a spec started
//!   elsewhere gets `SubmitError::NotWaiting`.
//! - After `shutdown()`, queued jobs still run; new submissions get `SubmitError::Closed`.
//! - Every `shutdown_with_grace` call checks the live worker count, so a repeated
//!   call still reports jobs that have not stopped.
//! - Dropping the executor closes admission, cancels every active job and
//!   detaches the runtime without waiting for running bodies.
//!
//! ## Example
//! ```rust
//! use jobvisor::{Executor, ExecutorConfig, JobContext, JobError, JobFn, JobSpec, JobStatus};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let exec = Executor::builder(ExecutorConfig { workers: 2, ..Default::default() }).build()?;
//!
//! let handle = exec.submit(JobSpec::new(JobFn::arc("Import raw files", |ctx: &JobContext| {
//!     for i in 0..4 {
//!         ctx.check_cancelled()?;
//!         ctx.set_progress((i + 1) as f64 / 4.0);
//!     }
//!     Ok::<_, JobError>(())
//! })))?;
//!
//! assert_eq!(handle.wait_blocking(), JobStatus::Finished);
//! exec.shutdown_blocking()?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::builder::ExecutorBuilder;
use crate::core::config::ExecutorConfig;
use crate::core::handle::{JobHandle, JobSnapshot};
use crate::core::queue::JobQueue;
use crate::core::registry::Registry;
use crate::core::worker::{self, Crew};
use crate::error::{RuntimeError, SubmitError};
use crate::events::{Bus, Event, EventKind};
use crate::jobs::{JobId, JobSpec, JobStatus};
use crate::listeners::ListenerId;

/// Bounded worker pool executing [`Job`](crate::Job)s.
pub struct Executor {
    cfg: ExecutorConfig,
    bus: Bus,
    queue: Arc<JobQueue>,
    registry: Arc<Registry>,
    crew: Arc<Crew>,
    resize: Mutex<()>,
    fanout: Mutex<Option<JoinHandle<()>>>,
    fanout_stop: CancellationToken,
    shutdown_requested: AtomicBool,
    rt: Handle,
    runtime: Option<Runtime>,
}

impl Executor {
    /// Starts building an executor with `cfg`.
    pub fn builder(cfg: ExecutorConfig) -> ExecutorBuilder {
        ExecutorBuilder::new(cfg)
    }

    /// Shorthand for `Executor::builder(cfg).build()`.
    pub fn new(cfg: ExecutorConfig) -> Result<Arc<Self>, RuntimeError> {
        Self::builder(cfg).build()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        cfg: ExecutorConfig,
        bus: Bus,
        queue: Arc<JobQueue>,
        registry: Arc<Registry>,
        crew: Arc<Crew>,
        fanout: Option<JoinHandle<()>>,
        fanout_stop: CancellationToken,
        runtime: Runtime,
    ) -> Self {
        Self {
            cfg,
            bus,
            queue,
            registry,
            crew,
            resize: Mutex::new(()),
            fanout: Mutex::new(fanout),
            fanout_stop,
            shutdown_requested: AtomicBool::new(false),
            rt: runtime.handle().clone(),
            runtime: Some(runtime),
        }
    }

    /// Configuration the executor was built with.
    pub fn config(&self) -> &ExecutorConfig {
        &self.cfg
    }

    // ---------------------------
    // Submission
    // ---------------------------

    /// Enqueues one job and returns its handle immediately.
    ///
    /// ### Errors
    /// - [`SubmitError::Closed`] after [`shutdown`](Self::shutdown)
    /// - [`SubmitError::Full`] when a bounded queue has no room
    /// - [`SubmitError::AlreadySubmitted`] when `spec` was submitted before
    /// - [`SubmitError::NotWaiting`] when `spec` was started elsewhere
    pub fn submit(&self, spec: JobSpec) -> Result<JobHandle, SubmitError> {
        self.submit_all(vec![spec])?
            .pop()
            .ok_or(SubmitError::Closed)
    }

    /// Enqueues all jobs, or none of them.
    ///
    /// Handles are returned in input order.
    pub fn submit_all(&self, specs: Vec<JobSpec>) -> Result<Vec<JobHandle>, SubmitError> {
        if self.queue.is_closed() {
            return Err(SubmitError::Closed);
        }
        claim(&specs)?;

        let tracked: Vec<(JobHandle, Option<ListenerId>)> =
            specs.iter().map(|spec| self.track(spec)).collect();

        let bus = &self.bus;
        let admitted = self.queue.push_all(specs, |spec| {
            bus.publish(
                Event::new(EventKind::JobSubmitted)
                    .with_job(spec.state().id())
                    .with_description(spec.description()),
            );
        });

        match admitted {
            Ok(()) => Ok(tracked.into_iter().map(|(h, _)| h).collect()),
            Err(e) => {
                for (handle, listener) in &tracked {
                    if let Some(listener) = listener {
                        self.registry.untrack(handle, *listener);
                    }
                    handle.state().unmark_submitted();
                }
                tracing::debug!(error = %e, count = tracked.len(), "submission rejected");
                Err(e)
            }
        }
    }

    /// Runs one job on the calling thread and returns its terminal status.
    ///
    /// The job goes through the same transitions, listeners and events as a
    /// queued job, but takes no worker. Blocks until the body returns.
    ///
    /// ### Errors
    /// Same admission errors as [`submit`](Self::submit), except `Full`.
    pub fn run_blocking(&self, spec: JobSpec) -> Result<JobStatus, SubmitError> {
        if self.queue.is_closed() {
            return Err(SubmitError::Closed);
        }
        claim(std::slice::from_ref(&spec))?;

        self.bus.publish(
            Event::new(EventKind::JobSubmitted)
                .with_job(spec.state().id())
                .with_description(spec.description()),
        );
        let (handle, _) = self.track(&spec);

        let status = worker::run_inline(&spec);
        tracing::debug!(job = handle.id().get(), %status, "inline job done");
        Ok(status)
    }

    /// Creates the handle and registers it, unless the spec already ended.
    fn track(&self, spec: &JobSpec) -> (JobHandle, Option<ListenerId>) {
        let handle = JobHandle::new(spec);
        let listener = if spec.state().status().is_terminal() {
            None
        } else {
            Some(self.registry.track(&handle))
        };
        (handle, listener)
    }

    // ---------------------------
    // Observation
    // ---------------------------

    /// Snapshots of every job that has not reached a terminal status, in submission order.
    pub fn active_jobs(&self) -> Vec<JobSnapshot> {
        self.registry.snapshots()
    }

    /// Looks up an active job.
    pub fn handle(&self, id: JobId) -> Option<JobHandle> {
        self.registry.get(id)
    }

    /// Number of jobs waiting for a worker.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Receiver for runtime events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    // ---------------------------
    // Control
    // ---------------------------

    /// Cancels every active job (waiting or running). Returns how many were canceled.
    pub fn cancel_all(&self) -> usize {
        let n = self.registry.cancel_all();
        tracing::debug!(canceled = n, "cancel_all");
        n
    }

    /// Current target size of the worker pool.
    pub fn workers(&self) -> usize {
        self.crew.target()
    }

    /// Resizes the worker pool.
    ///
    /// `n` is clamped to `1..=ExecutorConfig::worker_ceiling()`. Growing spawns
    /// workers at once; shrinking retires idle workers, and busy ones after
    /// their current job. Returns the applied size.
    pub fn set_workers(&self, n: usize) -> usize {
        let n = n.clamp(1, self.cfg.worker_ceiling());
        let _guard = self.resize.lock().unwrap_or_else(PoisonError::into_inner);

        let before = self.crew.target();
        self.crew.set_target(n);
        if !self.queue.is_closed() {
            for _ in self.crew.alive()..n {
                self.rt
                    .spawn(worker::worker_loop(self.crew.enlist(), Arc::clone(&self.queue)));
            }
        }
        tracing::info!(from = before, to = n, "worker pool resized");
        n
    }

    /// Stops admission. Already queued jobs still run; running jobs are not canceled.
    pub fn shutdown(&self) {
        if self.shutdown_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.close();
        tracing::info!(queued = self.queue.len(), "executor shutdown requested");
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
    }

    /// Stops admission and waits up to `grace` for the workers to drain the queue.
    ///
    /// ### Errors
    /// [`RuntimeError::GraceExceeded`] listing the jobs still running when the
    /// grace period ran out. Those jobs are not canceled.
    pub async fn shutdown_with_grace(&self, grace: Duration) -> Result<(), RuntimeError> {
        self.shutdown();

        let crew = Arc::clone(&self.crew);
        let fanout = self
            .fanout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let stop = self.fanout_stop.clone();
        let bus = self.bus.clone();
        let registry = Arc::clone(&self.registry);

        let waited = self.rt.spawn(async move {
            let deadline = tokio::time::Instant::now() + grace;
            let joined = tokio::time::timeout_at(deadline, crew.wait_idle())
                .await
                .is_ok();

            let stuck = if joined {
                bus.publish(Event::new(EventKind::AllStoppedWithin));
                Vec::new()
            } else {
                let stuck = registry.running();
                bus.publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
                stuck
            };

            stop.cancel();
            if let Some(f) = fanout {
                if joined {
                    let _ = tokio::time::timeout_at(deadline, f).await;
                }
            }
            (joined, stuck)
        });

        match waited.await {
            Ok((true, _)) => {
                tracing::info!("all workers stopped within grace");
                Ok(())
            }
            Ok((false, stuck)) => {
                tracing::warn!(?grace, ?stuck, "shutdown grace exceeded");
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
            Err(join) => {
                tracing::error!(error = %join, "shutdown waiter failed");
                Err(RuntimeError::GraceExceeded {
                    grace,
                    stuck: self.registry.running(),
                })
            }
        }
    }

    /// Blocking [`shutdown_with_grace`](Self::shutdown_with_grace) using the configured grace.
    ///
    /// Must not be called from inside an async runtime worker.
    pub fn shutdown_blocking(&self) -> Result<(), RuntimeError> {
        futures::executor::block_on(self.shutdown_with_grace(self.cfg.grace))
    }
}

/// Takes the submission claim on every spec, or on none of them.
fn claim(specs: &[JobSpec]) -> Result<(), SubmitError> {
    for (i, spec) in specs.iter().enumerate() {
        let rejected = if spec.state().status() == JobStatus::Processing {
            Some(SubmitError::NotWaiting)
        } else if !spec.state().mark_submitted() {
            Some(SubmitError::AlreadySubmitted)
        } else {
            None
        };
        if let Some(e) = rejected {
            for claimed in &specs[..i] {
                claimed.state().unmark_submitted();
            }
            return Err(e);
        }
    }
    Ok(())
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.queue.close();
        let canceled = self.registry.cancel_all();
        self.fanout_stop.cancel();
        if canceled > 0 {
            tracing::debug!(canceled, "executor dropped with active jobs");
        }
        if let Some(rt) = self.runtime.take() {
            rt.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use crate::jobs::{JobContext, JobFn, JobStatus, Priority};
    use crate::core::config::QueueOrdering;
    use crate::listeners::StatusChange;
    use std::sync::atomic::{AtomicU64, AtomicUsize};
    use std::sync::mpsc;

    fn exec(workers: usize) -> Arc<Executor> {
        Executor::new(ExecutorConfig {
            workers,
            ..ExecutorConfig::default()
        })
        .unwrap()
    }

    fn ok_job(name: &'static str) -> JobSpec {
        JobSpec::new(JobFn::arc(name, |_: &JobContext| Ok::<_, JobError>(())))
    }

    #[test]
    fn thousand_trivial_jobs_finish_exactly_once() {
        for workers in [1, 3, 8] {
            let ex = exec(workers);
            let finished = Arc::new(AtomicUsize::new(0));
            let total = Arc::new(AtomicUsize::new(0));

            let specs: Vec<JobSpec> = (0..1000)
                .map(|_| {
                    let spec = JobSpec::new(JobFn::arc("trivial", |ctx: &JobContext| {
                        ctx.finish();
                        Ok::<_, JobError>(())
                    }));
                    let f = Arc::clone(&finished);
                    let t = Arc::clone(&total);
                    spec.state().add_listener(move |c: &StatusChange| {
                        t.fetch_add(1, Ordering::SeqCst);
                        if c.new == JobStatus::Finished {
                            f.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                    spec
                })
                .collect();

            let handles = ex.submit_all(specs).unwrap();
            for h in &handles {
                assert_eq!(h.wait_blocking(), JobStatus::Finished);
            }

            assert_eq!(finished.load(Ordering::SeqCst), 1000);
            // Waiting → Processing → Finished, nothing else
            assert_eq!(total.load(Ordering::SeqCst), 2000);
            ex.shutdown_blocking().unwrap();
        }
    }

    #[test]
    fn panicking_job_is_error_and_next_job_runs() {
        let ex = exec(1);
        let b = ex
            .submit(JobSpec::new(JobFn::arc("B", |_: &JobContext| -> Result<(), JobError> {
                panic!("division by zero in scoring")
            })))
            .unwrap();
        let c = ex.submit(ok_job("C")).unwrap();

        assert_eq!(b.wait_blocking(), JobStatus::Error);
        assert!(b.error_message().unwrap().contains("division by zero"));
        assert_eq!(c.wait_blocking(), JobStatus::Finished);
    }

    #[test]
    fn failure_message_is_surfaced_verbatim() {
        let ex = exec(1);
        let h = ex
            .submit(JobSpec::new(JobFn::arc("Export", |_: &JobContext| -> Result<(), JobError> {
                Err(JobError::fail("cannot write /tmp/out.csv"))
            })))
            .unwrap();
        assert_eq!(h.wait_blocking(), JobStatus::Error);
        assert_eq!(h.error_message().as_deref(), Some("cannot write /tmp/out.csv"));
    }

    #[test]
    fn progress_is_observable_and_not_reset() {
        let ex = exec(1);
        let counter = Arc::new(AtomicU64::new(0));
        let (step_tx, step_rx) = mpsc::channel::<()>();
        let (ack_tx, ack_rx) = mpsc::channel::<()>();
        let step_rx = Mutex::new(step_rx);

        let c = Arc::clone(&counter);
        let h = ex
            .submit(JobSpec::new(JobFn::arc("A", move |ctx: &JobContext| {
                let rx = step_rx.lock().unwrap();
                for i in 1..=10u64 {
                    rx.recv().unwrap();
                    c.store(i, Ordering::SeqCst);
                    ctx.set_progress(i as f64 / 10.0);
                    ack_tx.send(()).unwrap();
                }
                ctx.finish();
                Ok::<_, JobError>(())
            })))
            .unwrap();

        for _ in 0..10 {
            step_tx.send(()).unwrap();
            ack_rx.recv().unwrap();
            let expected = counter.load(Ordering::SeqCst) as f64 / 10.0;
            assert_eq!(h.finished_percentage(), expected);
        }

        assert_eq!(h.wait_blocking(), JobStatus::Finished);
        assert_eq!(h.finished_percentage(), 1.0);
    }

    #[test]
    fn body_may_stop_short_without_forced_completion() {
        let ex = exec(1);
        let h = ex
            .submit(JobSpec::new(JobFn::arc("partial", |ctx: &JobContext| {
                ctx.set_progress(0.6);
                Ok::<_, JobError>(())
            })))
            .unwrap();
        assert_eq!(h.wait_blocking(), JobStatus::Finished);
        assert_eq!(h.finished_percentage(), 0.6);
    }

    #[test]
    fn cancel_running_job_is_cooperative() {
        let ex = exec(1);
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let h = ex
            .submit(JobSpec::new(JobFn::arc("long", move |ctx: &JobContext| -> Result<(), JobError> {
                let _ = started_tx.send(());
                while !ctx.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(JobError::Canceled)
            })))
            .unwrap();

        started_rx.recv().unwrap();
        assert!(h.cancel());
        assert!(!h.cancel());
        assert_eq!(h.wait_blocking(), JobStatus::Canceled);
    }

    #[test]
    fn duplicate_submission_is_rejected() {
        let ex = exec(1);
        let spec = ok_job("once");
        ex.submit(spec.clone()).unwrap();
        assert_eq!(
            ex.submit(spec).unwrap_err(),
            SubmitError::AlreadySubmitted
        );

        let dup = ok_job("dup");
        let err = ex.submit_all(vec![dup.clone(), dup.clone()]).unwrap_err();
        assert_eq!(err, SubmitError::AlreadySubmitted);
        // the batch was rolled back; the spec is still submittable
        assert_eq!(ex.submit(dup).unwrap().wait_blocking(), JobStatus::Finished);
    }

    #[test]
    fn submit_after_shutdown_is_closed_and_queued_jobs_drain() {
        let ex = exec(1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let blocker = ex
            .submit(JobSpec::new(JobFn::arc("blocker", move |_: &JobContext| {
                let _ = release_rx.lock().unwrap().recv();
                Ok::<_, JobError>(())
            })))
            .unwrap();
        let queued = ex.submit(ok_job("queued")).unwrap();

        ex.shutdown();
        assert_eq!(ex.submit(ok_job("late")).unwrap_err(), SubmitError::Closed);

        release_tx.send(()).unwrap();
        assert_eq!(blocker.wait_blocking(), JobStatus::Finished);
        assert_eq!(queued.wait_blocking(), JobStatus::Finished);
        ex.shutdown_blocking().unwrap();
    }

    #[test]
    fn bounded_queue_reports_full() {
        let ex = Executor::new(ExecutorConfig {
            workers: 1,
            queue_capacity: 1,
            ..ExecutorConfig::default()
        })
        .unwrap();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let running = ex
            .submit(JobSpec::new(JobFn::arc("running", move |ctx: &JobContext| {
                let _ = started_tx.send(());
                while !ctx.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Ok::<_, JobError>(())
            })))
            .unwrap();
        started_rx.recv().unwrap();

        let waiting = ex.submit(ok_job("waiting")).unwrap();
        let rejected = ok_job("rejected");
        assert_eq!(ex.submit(rejected.clone()).unwrap_err(), SubmitError::Full);
        assert_eq!(ex.active_jobs().len(), 2);
        assert_eq!(ex.queued_len(), 1);

        running.cancel();
        assert_eq!(waiting.wait_blocking(), JobStatus::Finished);
        // a rejected spec can be retried
        assert_eq!(ex.submit(rejected).unwrap().wait_blocking(), JobStatus::Finished);
    }

    #[test]
    fn priority_ordering_runs_high_first() {
        let ex = Executor::new(ExecutorConfig {
            workers: 1,
            ordering: QueueOrdering::Priority,
            ..ExecutorConfig::default()
        })
        .unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let (started_tx, started_rx) = mpsc::channel::<()>();

        let gate = ex
            .submit(JobSpec::new(JobFn::arc("gate", move |_: &JobContext| {
                let _ = started_tx.send(());
                let _ = release_rx.lock().unwrap().recv();
                Ok::<_, JobError>(())
            })))
            .unwrap();
        started_rx.recv().unwrap();

        let mut handles = Vec::new();
        for (name, prio) in [("n1", Priority::Normal), ("h1", Priority::High), ("n2", Priority::Normal)] {
            let o = Arc::clone(&order);
            let spec = JobSpec::new(JobFn::arc(name, move |_: &JobContext| {
                o.lock().unwrap().push(name);
                Ok::<_, JobError>(())
            }))
            .with_priority(prio);
            handles.push(ex.submit(spec).unwrap());
        }
        // re-rank a waiting job
        handles[2].set_priority(Priority::High);

        release_tx.send(()).unwrap();
        gate.wait_blocking();
        for h in &handles {
            h.wait_blocking();
        }
        assert_eq!(*order.lock().unwrap(), vec!["h1", "n2", "n1"]);
    }

    #[test]
    fn cancel_all_cancels_waiting_and_running() {
        let ex = exec(1);
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let running = ex
            .submit(JobSpec::new(JobFn::arc("running", move |ctx: &JobContext| {
                let _ = started_tx.send(());
                while !ctx.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Ok::<_, JobError>(())
            })))
            .unwrap();
        started_rx.recv().unwrap();
        let waiting = ex.submit(ok_job("waiting")).unwrap();

        assert_eq!(ex.cancel_all(), 2);
        assert_eq!(running.wait_blocking(), JobStatus::Canceled);
        assert_eq!(waiting.wait_blocking(), JobStatus::Canceled);
        assert!(ex.active_jobs().is_empty());
    }

    #[test]
    fn grace_exceeded_lists_stuck_jobs() {
        let ex = exec(1);
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let stuck = ex
            .submit(JobSpec::new(JobFn::arc("stubborn", move |ctx: &JobContext| {
                let _ = started_tx.send(());
                while !ctx.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Ok::<_, JobError>(())
            })))
            .unwrap();
        started_rx.recv().unwrap();

        let err = futures::executor::block_on(ex.shutdown_with_grace(Duration::from_millis(20)))
            .unwrap_err();
        match err {
            RuntimeError::GraceExceeded { stuck, .. } => assert_eq!(stuck, vec!["stubborn"]),
            other => panic!("unexpected {other:?}"),
        }

        // asking again still sees the running job
        let again = futures::executor::block_on(ex.shutdown_with_grace(Duration::from_millis(20)));
        match again {
            Err(RuntimeError::GraceExceeded { stuck, .. }) => assert_eq!(stuck, vec!["stubborn"]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(stuck.status(), JobStatus::Processing);

        stuck.cancel();
        assert_eq!(stuck.wait_blocking(), JobStatus::Canceled);
        futures::executor::block_on(ex.shutdown_with_grace(Duration::from_secs(5))).unwrap();
    }

    #[test]
    fn started_spec_is_rejected_and_batch_rolls_back() {
        let ex = exec(1);
        let started = ok_job("started elsewhere");
        started.state().start();
        assert_eq!(ex.submit(started.clone()).unwrap_err(), SubmitError::NotWaiting);
        assert!(ex.active_jobs().is_empty());
        assert_eq!(ex.queued_len(), 0);

        let fresh = ok_job("fresh");
        let err = ex.submit_all(vec![fresh.clone(), started]).unwrap_err();
        assert_eq!(err, SubmitError::NotWaiting);
        assert_eq!(ex.submit(fresh).unwrap().wait_blocking(), JobStatus::Finished);
    }

    #[test]
    fn precanceled_spec_publishes_only_submission() {
        let ex = exec(1);
        let mut rx = ex.subscribe();
        let spec = ok_job("abandoned");
        spec.state().cancel();

        let h = ex.submit(spec).unwrap();
        assert_eq!(h.wait_blocking(), JobStatus::Canceled);
        let tail = ex.submit(ok_job("tail")).unwrap();
        tail.wait_blocking();

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.job == Some(h.id()))
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![EventKind::JobSubmitted]);
        assert!(ex.handle(h.id()).is_none());
    }

    #[test]
    fn run_blocking_uses_the_caller_thread() {
        let ex = exec(1);
        let mut rx = ex.subscribe();
        let caller = std::thread::current().id();
        let seen = Arc::new(Mutex::new(None));

        let s = Arc::clone(&seen);
        let spec = JobSpec::new(JobFn::arc("Batch step", move |ctx: &JobContext| {
            *s.lock().unwrap() = Some(std::thread::current().id());
            ctx.set_progress(1.0);
            Ok::<_, JobError>(())
        }));
        let id = spec.state().id();
        assert_eq!(ex.run_blocking(spec.clone()).unwrap(), JobStatus::Finished);
        assert_eq!(*seen.lock().unwrap(), Some(caller));

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.job == Some(id))
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::JobSubmitted, EventKind::JobStarting, EventKind::JobFinished]
        );
        assert_eq!(ex.run_blocking(spec).unwrap_err(), SubmitError::AlreadySubmitted);

        let failing = JobSpec::new(JobFn::arc("broken step", |_: &JobContext| -> Result<(), JobError> {
            panic!("index out of range")
        }));
        assert_eq!(ex.run_blocking(failing.clone()).unwrap(), JobStatus::Error);
        assert!(failing.state().error_message().unwrap().contains("index out of range"));

        ex.shutdown();
        assert_eq!(ex.run_blocking(ok_job("late")).unwrap_err(), SubmitError::Closed);
    }

    #[test]
    fn resizing_changes_concurrency() {
        let ex = exec(1);
        assert_eq!(ex.workers(), 1);
        assert_eq!(ex.set_workers(3), 3);

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let specs: Vec<JobSpec> = (0..3)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                JobSpec::new(JobFn::arc("overlap", move |_: &JobContext| {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    let deadline = std::time::Instant::now() + Duration::from_secs(2);
                    while running.load(Ordering::SeqCst) < 3 && std::time::Instant::now() < deadline {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    peak.fetch_max(running.load(Ordering::SeqCst), Ordering::SeqCst);
                    Ok::<_, JobError>(())
                }))
            })
            .collect();
        for h in ex.submit_all(specs).unwrap() {
            h.wait_blocking();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 3);

        assert_eq!(ex.set_workers(1), 1);
        assert_eq!(ex.workers(), 1);
        assert_eq!(ex.submit(ok_job("after")).unwrap().wait_blocking(), JobStatus::Finished);

        assert_eq!(ex.set_workers(0), 1);
        assert_eq!(ex.set_workers(usize::MAX), ex.config().worker_ceiling());
        ex.shutdown_blocking().unwrap();
    }

    #[tokio::test]
    async fn caller_side_timeout_then_cancel() {
        let ex = exec(1);
        let h = ex
            .submit(JobSpec::new(JobFn::arc("slow", |ctx: &JobContext| {
                while !ctx.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Ok::<_, JobError>(())
            })))
            .unwrap();

        let timed = tokio::time::timeout(Duration::from_millis(20), h.wait()).await;
        assert!(timed.is_err());
        h.cancel();
        assert_eq!(h.wait().await, JobStatus::Canceled);
        drop(ex);
    }

    #[test]
    fn events_follow_job_lifecycle() {
        let ex = exec(1);
        let mut rx = ex.subscribe();
        let h = ex.submit(ok_job("Alignment")).unwrap();
        h.wait_blocking();

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.job == Some(h.id()))
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::JobSubmitted, EventKind::JobStarting, EventKind::JobFinished]
        );
        assert!(ex.handle(h.id()).is_none());
    }
}
