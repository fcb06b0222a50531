//! # Example: job_cancel
//!
//! Demonstrates cooperative cancellation of a running job.
//!
//! Shows how to:
//! - Poll [`JobContext::check_cancelled`] from a blocking body.
//! - Cancel through the caller's [`JobHandle`](jobvisor::JobHandle).
//! - Observe the transition with a [`StatusChange`] listener.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► submit("counter") ─► Waiting ─► Processing
//!   ├─► sleep 1.2s (body ticks, reports progress)
//!   ├─► handle.cancel()
//!   │     ├─► token cancelled
//!   │     ├─► listener sees Processing → Canceled
//!   │     └─► body's check_cancelled() returns Err(Canceled)
//!   └─► wait_blocking() == Canceled
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=jobvisor=debug cargo run --example job_cancel
//! ```

use std::{thread, time::Duration};

use jobvisor::{
    Executor, ExecutorConfig, JobContext, JobError, JobFn, JobSpec, JobStatus, StatusChange,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let exec = Executor::new(ExecutorConfig {
        workers: 1,
        grace: Duration::from_secs(5),
        ..ExecutorConfig::default()
    })?;

    let spec = JobSpec::new(JobFn::arc("counter", |ctx: &JobContext| -> Result<(), JobError> {
        let mut ticks = 0u32;
        loop {
            ctx.check_cancelled()?;
            ticks += 1;
            println!("[counter] tick #{ticks}");
            ctx.set_progress(f64::from(ticks.min(20)) / 20.0);
            thread::sleep(Duration::from_millis(250));
        }
    }));

    spec.state().add_listener(|c: &StatusChange| {
        println!("[listener] {}: {} → {}", c.job, c.old, c.new);
    });

    let handle = exec.submit(spec)?;
    thread::sleep(Duration::from_millis(1200));

    println!("[main] progress before cancel: {:.0}%", handle.finished_percentage() * 100.0);
    handle.cancel();

    let status = handle.wait_blocking();
    assert_eq!(status, JobStatus::Canceled);
    println!("[main] job ended as {status}");

    exec.shutdown_blocking()?;
    Ok(())
}
