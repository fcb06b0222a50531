//! # Example: custom_subscriber
//!
//! Demonstrates how to build and attach a custom event subscriber.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait.
//! - Inspect [`Event`] / [`EventKind`] for job lifecycle metrics.
//! - Wire the subscriber into [`Executor::builder`].
//!
//! ## Flow
//! ```text
//! JobSpec ──► Executor::submit()
//!     ├─► Bus.publish(JobSubmitted)
//!     ├─► worker ─► JobState transitions
//!     │     └─► Registry listener ─► publish(JobStarting / JobFinished / JobFailed / JobCanceled)
//!     └─► fan-out task
//!           └─► SubscriberSet.emit() ──► ConsoleSubscriber.on_event()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example custom_subscriber
//! ```

use std::{sync::Arc, thread, time::Duration};

use jobvisor::{
    Event, EventKind, Executor, ExecutorConfig, JobContext, JobError, JobFn, JobSpec, Subscribe,
};

/// A simple console subscriber that prints job events.
struct ConsoleSubscriber;

#[async_trait::async_trait]
impl Subscribe for ConsoleSubscriber {
    async fn on_event(&self, ev: &Event) {
        let job = ev.job.map(|id| id.to_string()).unwrap_or_default();
        let desc = ev.description.as_deref().unwrap_or("<unknown>");
        match ev.kind {
            EventKind::JobSubmitted => println!("[sub] submitted: {job} {desc}"),
            EventKind::JobStarting => println!("[sub] starting:  {job} {desc}"),
            EventKind::JobFinished => println!("[sub] finished:  {job} {desc}"),
            EventKind::JobFailed => println!(
                "[sub] failed:    {job} {desc} reason={}",
                ev.reason.as_deref().unwrap_or("<none>")
            ),
            EventKind::JobCanceled => println!("[sub] canceled:  {job} {desc}"),

            EventKind::ShutdownRequested => println!("[sub] shutdown requested"),
            EventKind::AllStoppedWithin => println!("[sub] all stopped within grace"),
            EventKind::GraceExceeded => println!(
                "[sub] grace exceeded, stuck: {}",
                ev.reason.as_deref().unwrap_or("")
            ),

            EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => {}
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

fn sleeper(name: &'static str, ms: u64) -> JobSpec {
    JobSpec::new(JobFn::arc(name, move |ctx: &JobContext| {
        for step in 1..=10u32 {
            ctx.check_cancelled()?;
            thread::sleep(Duration::from_millis(ms / 10));
            ctx.set_progress(f64::from(step) / 10.0);
        }
        Ok::<(), JobError>(())
    }))
}

fn failing(name: &'static str) -> JobSpec {
    JobSpec::new(JobFn::arc(name, |_: &JobContext| -> Result<(), JobError> {
        thread::sleep(Duration::from_millis(100));
        Err(JobError::fail("boom (demo failure)"))
    }))
}

fn main() -> anyhow::Result<()> {
    println!("custom_subscriber demo\n");

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(ConsoleSubscriber)];
    let exec = Executor::builder(ExecutorConfig {
        workers: 2,
        ..ExecutorConfig::default()
    })
    .with_subscribers(subs)
    .build()?;

    let handles = exec.submit_all(vec![sleeper("alpha", 300), failing("bravo")])?;
    for h in &handles {
        h.wait_blocking();
    }

    exec.shutdown_blocking()?;
    println!("\nfinished");
    Ok(())
}
