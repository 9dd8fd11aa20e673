//! Startup recovery and lifecycle transitions.

use std::path::PathBuf;
use std::time::SystemTime;

use crate::job::ExportJob;

use super::state::{QueueInner, QueueState};
use super::JobQueue;

impl JobQueue {
    /// Open the queue: ensure the record directory exists, rebuild the
    /// collection from disk, then start accepting jobs. Returns the number
    /// of records recovered.
    ///
    /// Opening an already-accepting queue is a no-op returning the current
    /// count; opening a closed queue re-runs recovery and re-opens.
    pub async fn open(&self) -> u64 {
        let mut inner = self.inner.lock().await;
        if inner.state == QueueState::Accepting {
            return inner.jobs.len() as u64;
        }
        if let Err(e) = tokio::fs::create_dir_all(&self.queue_dir).await {
            tracing::error!(path = %self.queue_dir.display(), "could not create queue directory: {}", e);
        }
        let recovered = self.recover_locked(&mut inner).await;
        inner.state = QueueState::Accepting;
        recovered
    }

    /// Stop accepting new jobs. Claiming, listing, and removal keep working
    /// so in-flight jobs can finish and be removed during drain.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = QueueState::Closed;
        tracing::debug!("queue closed");
    }

    /// Rebuild the in-memory collection from the on-disk record files,
    /// oldest modification first. Jobs that were in-flight get their claim
    /// reset and their partial artifact deleted so they become eligible
    /// again. Temp files left by interrupted record writes are swept away.
    /// Unreadable files are logged and skipped, never aborting the rest of
    /// the pass. Returns the number of records recovered.
    pub async fn recover(&self) -> u64 {
        let mut inner = self.inner.lock().await;
        self.recover_locked(&mut inner).await
    }

    /// Parse every record file in the queue directory, oldest modification
    /// first, skipping unreadable or malformed entries. Read-only: claims
    /// are returned exactly as stored and nothing is deleted.
    pub async fn scan_records(&self) -> Vec<ExportJob> {
        let mut dir = match tokio::fs::read_dir(&self.queue_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(path = %self.queue_dir.display(), "could not list queue directory: {}", e);
                return Vec::new();
            }
        };

        let mut records: Vec<(SystemTime, PathBuf)> = Vec::new();
        loop {
            match dir.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name();
                    let Some(name) = name.to_str() else { continue };
                    if !Self::is_record_name(name) {
                        continue;
                    }
                    let meta = match entry.metadata().await {
                        Ok(meta) => meta,
                        Err(e) => {
                            tracing::warn!(path = %entry.path().display(), "could not stat record file: {}", e);
                            continue;
                        }
                    };
                    if !meta.is_file() {
                        continue;
                    }
                    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                    records.push((modified, entry.path()));
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(path = %self.queue_dir.display(), "error listing queue directory: {}", e);
                    break;
                }
            }
        }

        // Oldest-persisted-first; ties fall back to the path (and thus the
        // embedded job key).
        records.sort();

        let mut jobs = Vec::with_capacity(records.len());
        for (_, path) in records {
            let data = match tokio::fs::read_to_string(&path).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "could not read job record: {}", e);
                    continue;
                }
            };
            match serde_json::from_str::<ExportJob>(&data) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping malformed job record: {}", e);
                }
            }
        }
        jobs
    }

    /// Delete `.json.tmp` leftovers from record writes interrupted before
    /// their rename. Runs only from recovery; the read-only scan must not
    /// modify the directory.
    async fn sweep_stale_temps(&self) {
        let mut dir = match tokio::fs::read_dir(&self.queue_dir).await {
            Ok(dir) => dir,
            Err(_) => return,
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !Self::is_stale_temp_name(name) {
                continue;
            }
            let path = entry.path();
            tracing::info!(path = %path.display(), "removing stale temp record");
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), "could not delete temp record: {}", e);
            }
        }
    }

    async fn recover_locked(&self, inner: &mut QueueInner) -> u64 {
        self.sweep_stale_temps().await;
        inner.jobs.clear();

        for mut job in self.scan_records().await {
            // A stored claim means the job was in-flight when the process
            // stopped; whatever exists at that path is unverifiable.
            if let Some(stale) = job.output_path.take() {
                tracing::info!(
                    started_at = job.started_at,
                    path = %stale.display(),
                    "resetting in-flight job, discarding partial artifact"
                );
                match tokio::fs::remove_file(&stale).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!(path = %stale.display(), "could not delete partial artifact: {}", e);
                    }
                }
            }
            inner.jobs.push_back(job);
        }

        let recovered = inner.jobs.len() as u64;
        tracing::debug!(recovered, path = %self.queue_dir.display(), "queue recovery complete");
        recovered
    }
}
