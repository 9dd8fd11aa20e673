//! Queue operations: enqueue, claim, remove, list, duplicate check.

use crate::artifact::derive_output_path;
use crate::job::{ExportJob, ExportRequest, JobKind};

use super::state::QueueState;
use super::JobQueue;

impl JobQueue {
    /// Queue a job: persist its record file first, then make it visible in
    /// memory. Silently does nothing unless the queue is accepting.
    ///
    /// A failed record write is logged and the job dropped rather than
    /// admitted, so a job is never claimable without its on-disk record.
    /// There is no failure return; callers needing confirmation re-query
    /// `list_all` or `find_duplicate`.
    pub async fn enqueue(&self, job: ExportJob) {
        let mut inner = self.inner.lock().await;
        if inner.state != QueueState::Accepting {
            tracing::debug!(
                started_at = job.started_at,
                state = ?inner.state,
                "queue not accepting, job dropped"
            );
            return;
        }
        match self.write_record(&job).await {
            Ok(()) => inner.jobs.push_back(job),
            Err(e) => {
                tracing::error!(started_at = job.started_at, "job not queued, record write failed: {e:#}");
            }
        }
    }

    /// Claim the earliest pending job that fits the filter: unclaimed, record
    /// count within `max_records` (an unbounded job only fits an unbounded
    /// filter), kind matching `kind` when given.
    ///
    /// On a match the stored record gets its deterministic output path
    /// assigned in place, the claim is persisted back to the record file
    /// (best-effort), and a snapshot of the claimed record is returned.
    /// Returns `None`, leaving the collection untouched, when nothing is
    /// eligible.
    pub async fn claim_next(
        &self,
        max_records: Option<u64>,
        kind: Option<JobKind>,
    ) -> Option<ExportJob> {
        let mut inner = self.inner.lock().await;
        if inner.state == QueueState::Uninitialized {
            return None;
        }
        let pos = inner.jobs.iter().position(|job| {
            job.output_path.is_none()
                && records_within(job.total_records, max_records)
                && kind.map_or(true, |k| job.kind == k)
        })?;

        let job = &mut inner.jobs[pos];
        let path = derive_output_path(&self.export_dir, &job.email, job.started_at, &job.request);
        job.output_path = Some(path);
        let claimed = job.clone();

        // Mirror the claim to disk so a crash while the job runs is visible
        // to the next recovery. The in-memory claim stands even if this fails.
        if let Err(e) = self.write_record(&claimed).await {
            tracing::warn!(started_at = claimed.started_at, "could not persist claim: {e:#}");
        }
        Some(claimed)
    }

    /// Remove a job: delete its record file (quietly; it may already be
    /// gone) and drop it from the collection. Safe to call twice for the
    /// same job. Called by the executor on completion, so it keeps working
    /// after `close()`.
    pub async fn remove(&self, job: &ExportJob) {
        let mut inner = self.inner.lock().await;
        let path = self.record_path(job.started_at);
        tracing::debug!(started_at = job.started_at, path = %path.display(), "removing job from queue");
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), "could not delete job record: {}", e);
            }
        }
        inner.jobs.retain(|j| j.started_at != job.started_at);
    }

    /// Snapshot of the collection at call time.
    pub async fn list_all(&self) -> Vec<ExportJob> {
        let inner = self.inner.lock().await;
        inner.jobs.iter().cloned().collect()
    }

    /// Current in-memory size.
    pub async fn count(&self) -> usize {
        self.inner.lock().await.jobs.len()
    }

    /// Find an already-queued job from the same requester with the same
    /// request parameters (both compared case-insensitively), skipping the
    /// candidate itself. Used to refuse duplicate submissions.
    pub async fn find_duplicate(&self, candidate: &ExportJob) -> Option<ExportJob> {
        let inner = self.inner.lock().await;
        inner
            .jobs
            .iter()
            .find(|j| {
                j.started_at != candidate.started_at
                    && j.email.eq_ignore_ascii_case(&candidate.email)
                    && requests_match(&j.request, &candidate.request)
            })
            .cloned()
    }
}

/// A bounded job fits any ceiling at or above its count; an unbounded job
/// only fits an unrestricted filter.
fn records_within(total: Option<u64>, ceiling: Option<u64>) -> bool {
    match (total, ceiling) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(t), Some(c)) => t <= c,
    }
}

fn requests_match(a: &ExportRequest, b: &ExportRequest) -> bool {
    a.query.eq_ignore_ascii_case(&b.query) && a.file_name.eq_ignore_ascii_case(&b.file_name)
}

#[cfg(test)]
mod tests {
    use super::records_within;

    #[test]
    fn record_ceiling_matrix() {
        assert!(records_within(Some(10), None));
        assert!(records_within(None, None));
        assert!(records_within(Some(10), Some(10)));
        assert!(records_within(Some(10), Some(100)));
        assert!(!records_within(Some(101), Some(100)));
        assert!(!records_within(None, Some(100)));
    }
}
