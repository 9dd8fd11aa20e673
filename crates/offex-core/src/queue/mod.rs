//! Crash-recoverable persistent job queue.
//!
//! One JSON record file per job mirrors the in-memory collection; the files
//! are the source of truth across restarts. Every operation runs under one
//! internal lock that also covers the mirroring file I/O, so enqueue, claim,
//! remove, and recovery never interleave.

pub mod state;

mod ops;
mod recovery;


pub use state::QueueState;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::job::{ExportJob, JobKey};
use state::QueueInner;

/// Record files are named `export-<started_at>.json`.
const RECORD_PREFIX: &str = "export-";
const RECORD_SUFFIX: &str = ".json";

/// Persistent export-job queue.
///
/// Starts [`QueueState::Uninitialized`]; call [`JobQueue::open`] to run
/// recovery and begin accepting jobs. [`JobQueue::close`] stops admission
/// while leaving claiming and removal usable so in-flight jobs can drain.
pub struct JobQueue {
    queue_dir: PathBuf,
    export_dir: PathBuf,
    inner: Mutex<QueueInner>,
}

impl JobQueue {
    /// Create a queue over the given record and artifact directories.
    /// No I/O happens until [`JobQueue::open`].
    pub fn new(queue_dir: impl Into<PathBuf>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            queue_dir: queue_dir.into(),
            export_dir: export_dir.into(),
            inner: Mutex::new(QueueInner::new()),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> QueueState {
        self.inner.lock().await.state
    }

    /// On-disk record file for a job key.
    fn record_path(&self, key: JobKey) -> PathBuf {
        self.queue_dir
            .join(format!("{RECORD_PREFIX}{key}{RECORD_SUFFIX}"))
    }

    /// Whether a directory entry name looks like one of our record files.
    /// Excludes the `.tmp` files left by an interrupted write.
    fn is_record_name(name: &str) -> bool {
        name.starts_with(RECORD_PREFIX) && name.ends_with(RECORD_SUFFIX)
    }

    /// Whether a directory entry name is a temp file left by a record write
    /// interrupted before its rename.
    fn is_stale_temp_name(name: &str) -> bool {
        name.starts_with(RECORD_PREFIX) && name.ends_with(".json.tmp")
    }

    /// Durably write a job's record: serialize to a temp file, sync, then
    /// rename over the final name so a crash mid-write never leaves a
    /// half-written record under the real key. A failed write removes its
    /// temp file before returning the error.
    async fn write_record(&self, job: &ExportJob) -> Result<()> {
        let path = self.record_path(job.started_at);
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = Self::write_record_at(&tmp, &path, job).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }

    async fn write_record_at(tmp: &Path, path: &Path, job: &ExportJob) -> Result<()> {
        let data = serde_json::to_vec_pretty(job).context("serialize job record")?;

        let mut file = tokio::fs::File::create(tmp)
            .await
            .with_context(|| format!("create {}", tmp.display()))?;
        file.write_all(&data)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        file.sync_all()
            .await
            .with_context(|| format!("sync {}", tmp.display()))?;
        drop(file);

        tokio::fs::rename(tmp, path)
            .await
            .with_context(|| format!("rename {} to {}", tmp.display(), path.display()))?;
        Ok(())
    }
}
