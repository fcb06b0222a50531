//! # Logging subscriber.
//!
//! [`LogWriter`] turns executor events into `tracing` records. Install any
//! `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Output (fmt layer)
//! ```text
//! INFO jobvisor: job starting job=7 description="Baseline correction"
//! WARN jobvisor: job failed job=7 description="Baseline correction" reason="no scans"
//! INFO jobvisor: all workers stopped within grace
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// `tracing`-backed event logger (`logging` feature).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let job = e.job.map(|j| j.get());
        let description = e.description.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::JobSubmitted => {
                tracing::debug!(target: "jobvisor", ?job, description, "job submitted")
            }
            EventKind::JobStarting => {
                tracing::info!(target: "jobvisor", ?job, description, "job starting")
            }
            EventKind::JobFinished => {
                tracing::info!(target: "jobvisor", ?job, description, "job finished")
            }
            EventKind::JobFailed => {
                tracing::warn!(target: "jobvisor", ?job, description, reason, "job failed")
            }
            EventKind::JobCanceled => {
                tracing::info!(target: "jobvisor", ?job, description, "job canceled")
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "jobvisor", "shutdown requested")
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(target: "jobvisor", "all workers stopped within grace")
            }
            EventKind::GraceExceeded => {
                tracing::warn!(target: "jobvisor", stuck = reason, "grace exceeded")
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                tracing::warn!(
                    target: "jobvisor",
                    subscriber = e.subscriber.unwrap_or(""),
                    reason,
                    kind = ?e.kind,
                    "subscriber problem"
                )
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
