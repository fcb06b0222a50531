//! # Example: fan_out
//!
//! A master job splits its work into subtasks and coordinates them as a
//! fail-fast group. One subtask fails; its siblings are canceled and the
//! master ends in `Error` with the subtask's message.
//!
//! ## Flow
//! ```text
//! master "Align samples"
//!   ├─► submit_all([sample 0 .. sample 4])
//!   ├─► ctx.run_group(&subs)
//!   │     ├─ sample 3 fails ─► group trips
//!   │     ├─ siblings canceled
//!   │     └─ master.error("sample 3: no peaks found")
//!   └─► body returns; master stays in Error
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example fan_out --features logging
//! ```

use std::{
    sync::{Arc, Weak},
    thread,
    time::Duration,
};

use jobvisor::{
    Executor, ExecutorConfig, JobContext, JobError, JobFn, JobSpec, JobStatus, LogWriter,
    Subscribe,
};

const SAMPLES: usize = 5;

fn sample(i: usize) -> JobSpec {
    JobSpec::new(JobFn::arc(format!("sample {i}"), move |ctx: &JobContext| {
        for step in 1..=20u32 {
            ctx.check_cancelled()?;
            if i == 3 && step == 5 {
                return Err(JobError::fail("no peaks found"));
            }
            thread::sleep(Duration::from_millis(20));
            ctx.set_progress(f64::from(step) / 20.0);
        }
        Ok(())
    }))
}

fn master(exec: Weak<Executor>) -> JobSpec {
    JobSpec::new(JobFn::arc(
        "Align samples",
        move |ctx: &JobContext| -> Result<(), JobError> {
            let Some(exec) = exec.upgrade() else {
                return Err(JobError::Canceled);
            };
            let subs = exec
                .submit_all((0..SAMPLES).map(sample).collect())
                .map_err(|e| JobError::fail(e.to_string()))?;

            ctx.set_description(format!("Aligning {SAMPLES} samples"));
            match ctx.run_group(&subs) {
                JobStatus::Canceled => Err(JobError::Canceled),
                _ => Ok(()),
            }
        },
    ))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let exec = Executor::builder(ExecutorConfig {
        workers: SAMPLES + 1,
        ..ExecutorConfig::default()
    })
    .with_subscribers(subs)
    .build()?;

    let handle = exec.submit(master(Arc::downgrade(&exec)))?;
    let status = handle.wait_blocking();

    println!(
        "master: {status} ({})",
        handle.error_message().as_deref().unwrap_or("no error")
    );

    exec.shutdown_blocking()?;
    Ok(())
}
