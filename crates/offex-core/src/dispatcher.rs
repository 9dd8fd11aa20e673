//! Capacity-gated dispatcher for one class of export jobs.
//!
//! Wraps a fixed-size worker pool behind a counting admission gate so that
//! "a slot is free" and "a worker is free" stay in lock-step across the
//! two-step reserve-then-submit protocol: capacity is reserved before the
//! job to run is even known, and travels with the job as a [`CapacityToken`]
//! once submitted.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::executor::ExportExecutor;
use crate::job::{ExportJob, JobKind};

/// Submission failure. Under correct permit accounting this only happens
/// when the dispatcher has begun shutting down.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher is shutting down")]
    ShuttingDown,
}

/// One unit of a dispatcher's concurrency budget.
///
/// Returned by [`Dispatcher::reserve`] and consumed by exactly one of
/// [`Dispatcher::submit`] (the token then travels with the job's execution)
/// or [`CapacityToken::release`]. Dropping the token is the single release
/// point, so capacity returns whether the holder completes, fails, or is
/// cancelled mid-flight.
#[derive(Debug)]
pub struct CapacityToken {
    permit: OwnedSemaphorePermit,
}

impl CapacityToken {
    fn new(permit: OwnedSemaphorePermit) -> Self {
        Self { permit }
    }

    /// Return the capacity without submitting work.
    pub fn release(self) {
        drop(self.permit);
    }
}

/// Fixed-capacity worker pool for one job class.
///
/// Jobs are spawned as tasks on the async runtime and tracked so shutdown
/// can drain them gracefully and then abort stragglers. Finished tasks are
/// retired on the next submission, so the set never holds more than the
/// in-flight work plus whatever completed since the last submit. The pool
/// label (`export-pool-<max|nolimit>-<kind|allkinds>`) identifies the class
/// in log output, mirroring how the worker threads would be named.
pub struct Dispatcher {
    label: String,
    capacity: usize,
    execution_delay: Duration,
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<()>,
    accepting: bool,
}

impl Dispatcher {
    /// Create a dispatcher with `concurrency` slots. `max_records` and
    /// `kind` only feed the pool label; filtering happens at the queue.
    pub fn new(
        concurrency: usize,
        execution_delay: Duration,
        max_records: Option<u64>,
        kind: Option<JobKind>,
    ) -> Self {
        let capacity = concurrency.max(1);
        Self {
            label: pool_label(max_records, kind),
            capacity,
            execution_delay,
            semaphore: Arc::new(Semaphore::new(capacity)),
            tasks: JoinSet::new(),
            accepting: true,
        }
    }

    /// Wait up to `timeout` for a free slot. `None` when the wait timed out
    /// or the dispatcher has shut down. Every `Some` must be paired with
    /// exactly one `submit` or token release.
    pub async fn reserve(&self, timeout: Duration) -> Option<CapacityToken> {
        match tokio::time::timeout(timeout, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Some(CapacityToken::new(permit)),
            // Semaphore closed: shutting down.
            Ok(Err(_)) => None,
            // Timed out.
            Err(_) => None,
        }
    }

    /// Hand a claimed job to the pool. The token moves into the spawned
    /// task and on to the executor, which holds it until the execution
    /// finishes, however it finishes. The configured execution delay is
    /// applied before the executor runs. On error the token is released
    /// immediately.
    pub fn submit(
        &mut self,
        job: ExportJob,
        token: CapacityToken,
        executor: Arc<dyn ExportExecutor>,
    ) -> Result<(), DispatchError> {
        if !self.accepting {
            return Err(DispatchError::ShuttingDown);
        }
        self.reap_finished();
        let delay = self.execution_delay;
        let label = self.label.clone();
        self.tasks.spawn(async move {
            // The token lives in this future until handed to the executor;
            // dropping the future at any await point returns the capacity.
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let started_at = job.started_at;
            if let Err(e) = executor.execute(job, token).await {
                tracing::warn!(pool = %label, started_at, "export task failed: {e:#}");
            }
        });
        Ok(())
    }

    /// Retire entries for tasks that have already finished, so `tasks` only
    /// tracks in-flight work.
    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if result.is_err_and(|e| e.is_panic()) {
                tracing::warn!(pool = %self.label, "export task panicked");
            }
        }
    }

    /// Stop accepting submissions and wake pending `reserve` calls.
    /// In-flight tasks keep running; drain them with `await_termination`.
    pub fn shutdown(&mut self) {
        self.accepting = false;
        self.semaphore.close();
        tracing::debug!(pool = %self.label, "dispatcher shut down");
    }

    /// Wait up to `timeout` for all spawned tasks to finish. `true` when the
    /// pool drained in time.
    pub async fn await_termination(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.tasks.is_empty() {
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(Err(e))) if e.is_panic() => {
                    tracing::warn!(pool = %self.label, "export task panicked");
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => return false,
            }
        }
        true
    }

    /// Abort every remaining task and reap them, returning how many were
    /// still running. Cancellation is logical: tasks stop at their next
    /// await point, and work that ignores cancellation is abandoned rather
    /// than killed at the OS level.
    pub async fn shutdown_now(&mut self) -> usize {
        self.reap_finished();
        let remaining = self.tasks.len();
        if remaining > 0 {
            tracing::warn!(pool = %self.label, remaining, "aborting unfinished export tasks");
        }
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        remaining
    }

    /// Free slots right now (logs and tests).
    pub fn available_capacity(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Configured slot count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pool label used in log output.
    pub fn label(&self) -> &str {
        &self.label
    }
}

fn pool_label(max_records: Option<u64>, kind: Option<JobKind>) -> String {
    let records = match max_records {
        Some(n) => n.to_string(),
        None => "nolimit".to_string(),
    };
    let kinds = match kind {
        Some(k) => k.as_str(),
        None => "allkinds",
    };
    format!("export-pool-{records}-{kinds}")
}
