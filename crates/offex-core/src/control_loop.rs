//! Supervisory control loop for one worker class.
//!
//! Polls the queue, reserves dispatcher capacity, and hands eligible jobs
//! to the execution collaborator. Owns its dispatcher's lifecycle, including
//! the graceful-then-forced shutdown path.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::WorkerClassConfig;
use crate::dispatcher::Dispatcher;
use crate::executor::ExportExecutor;
use crate::queue::JobQueue;

/// Loop lifecycle. `Terminated` is final: a finished loop never restarts,
/// a new one must be constructed to resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Draining,
    Terminated,
}

/// One polling supervisor matching free capacity to eligible queued jobs.
///
/// Constructed per worker-class configuration; multiple loops over the same
/// queue run independently, each with its own dispatcher and permit pool.
pub struct ControlLoop {
    config: WorkerClassConfig,
    queue: Arc<JobQueue>,
    executor: Arc<dyn ExportExecutor>,
    dispatcher: Dispatcher,
    shutdown: watch::Receiver<bool>,
    state: LoopState,
}

impl ControlLoop {
    pub fn new(
        config: WorkerClassConfig,
        queue: Arc<JobQueue>,
        executor: Arc<dyn ExportExecutor>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            config.concurrency,
            config.execution_delay,
            config.max_records,
            config.kind,
        );
        Self {
            config,
            queue,
            executor,
            dispatcher,
            shutdown,
            state: LoopState::Running,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until shutdown is signaled, then drain and terminate.
    ///
    /// Each iteration: sleep the poll delay, reserve capacity (both cut
    /// short by the shutdown signal), re-check shutdown, then claim and
    /// submit the next eligible job or return the unused capacity. A
    /// rejected submission is loop-fatal and proceeds straight to drain.
    pub async fn run(&mut self) {
        if self.state != LoopState::Running {
            return;
        }
        tracing::info!(
            pool = %self.dispatcher.label(),
            concurrency = self.config.concurrency,
            poll_delay_ms = self.config.poll_delay.as_millis() as u64,
            "control loop started"
        );

        loop {
            if self.shutdown_requested() {
                break;
            }
            if self.sleep_poll_delay().await {
                break;
            }

            let token = tokio::select! {
                token = self.dispatcher.reserve(self.config.poll_delay) => token,
                _ = self.shutdown.changed() => None,
            };
            let Some(token) = token else {
                if self.shutdown_requested() {
                    break;
                }
                continue;
            };

            // Re-check after the wait so a shutdown that arrived while
            // reserving is honored before more work is admitted.
            if self.shutdown_requested() {
                token.release();
                break;
            }

            match self
                .queue
                .claim_next(self.config.max_records, self.config.kind)
                .await
            {
                Some(job) => {
                    tracing::debug!(
                        pool = %self.dispatcher.label(),
                        started_at = job.started_at,
                        "submitting export job"
                    );
                    if let Err(e) = self.dispatcher.submit(job, token, self.executor.clone()) {
                        tracing::warn!(pool = %self.dispatcher.label(), "submission rejected, draining: {}", e);
                        break;
                    }
                }
                None => token.release(),
            }
        }

        self.drain().await;
    }

    /// Sleep the poll delay, cut short by the shutdown signal. Returns
    /// whether shutdown was requested.
    async fn sleep_poll_delay(&mut self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.config.poll_delay) => {}
            _ = self.shutdown.changed() => {}
        }
        self.shutdown_requested()
    }

    /// A `true` value or a dropped sender both mean shutdown.
    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow() || self.shutdown.has_changed().is_err()
    }

    /// Graceful drain bounded by the configured grace period, then an
    /// unconditional forced shutdown so the loop terminates in bounded time
    /// even if worker tasks hang.
    async fn drain(&mut self) {
        self.state = LoopState::Draining;
        tracing::info!(pool = %self.dispatcher.label(), "draining export pool");
        self.dispatcher.shutdown();
        if !self
            .dispatcher
            .await_termination(self.config.shutdown_grace)
            .await
        {
            tracing::warn!(pool = %self.dispatcher.label(), "drain timed out");
        }
        self.dispatcher.shutdown_now().await;
        self.state = LoopState::Terminated;
        tracing::info!(pool = %self.dispatcher.label(), "control loop terminated");
    }
}
