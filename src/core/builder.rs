use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::{
    config::ExecutorConfig,
    executor::Executor,
    queue::JobQueue,
    registry::Registry,
    worker::{self, Crew},
};
use crate::{
    error::RuntimeError,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for an [`Executor`] with optional event subscribers.
pub struct ExecutorBuilder {
    cfg: ExecutorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ExecutorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: ExecutorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues; they never slow down job execution.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Starts the runtime, the workers and the subscriber fan-out.
    ///
    /// ### Errors
    /// [`RuntimeError::RuntimeBuild`] if the worker runtime cannot be created.
    pub fn build(self) -> Result<Arc<Executor>, RuntimeError> {
        let workers = self.cfg.worker_count();
        let ceiling = self.cfg.worker_ceiling();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers.min(2))
            .max_blocking_threads(ceiling)
            .thread_name("jobvisor-worker")
            .enable_time()
            .build()?;
        let rt = runtime.handle().clone();

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let queue = Arc::new(JobQueue::new(self.cfg.queue_limit(), self.cfg.ordering));
        let registry = Registry::new(bus.clone());

        let fanout_stop = CancellationToken::new();
        let fanout = if self.subscribers.is_empty() {
            None
        } else {
            let mut rx = bus.subscribe();
            let set = SubscriberSet::new(self.subscribers, bus.clone(), &rt);
            let stop = fanout_stop.clone();
            Some(rt.spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        msg = rx.recv() => match msg {
                            Ok(ev) => set.emit(&ev),
                            Err(RecvError::Lagged(skipped)) => {
                                tracing::warn!(skipped, "event fan-out lagged");
                            }
                            Err(RecvError::Closed) => break,
                        },
                        _ = stop.cancelled() => break,
                    }
                }
                set.shutdown().await;
            }))
        };

        let crew = Crew::new(workers);
        for _ in 0..workers {
            rt.spawn(worker::worker_loop(crew.enlist(), Arc::clone(&queue)));
        }

        tracing::debug!(workers, ceiling, ordering = ?self.cfg.ordering, "executor started");
        Ok(Arc::new(Executor::new_internal(
            self.cfg,
            bus,
            queue,
            registry,
            crew,
            fanout,
            fanout_stop,
            runtime,
        )))
    }
}
