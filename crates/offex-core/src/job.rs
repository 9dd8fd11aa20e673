//! Job records for the export queue.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Job identifier: the job's start time in Unix milliseconds.
///
/// Doubles as the on-disk record file key, so it must be unique per job
/// even when two jobs are created within the same millisecond (see
/// [`next_job_key`]).
pub type JobKey = i64;

/// Export flavor, a small closed set. Stored as a lowercase string in both
/// record files and config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Index,
    Archive,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Index => "index",
            JobKind::Archive => "archive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "index" => Some(JobKind::Index),
            "archive" => Some(JobKind::Archive),
            _ => None,
        }
    }
}

/// Requester-supplied export parameters. Opaque to the queue; used for
/// duplicate detection and for naming the output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Query expression selecting the records to export.
    pub query: String,
    /// Base name for the artifact file (sanitized before use).
    pub file_name: String,
}

/// One requested export, as persisted to its record file.
///
/// `output_path` is the claim marker: `None` means pending, `Some` means the
/// job has been handed out for execution. There is no separate status field.
/// Unknown fields in a stored record are ignored on read so records written
/// by newer versions still load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    /// Start-time key, assigned once via [`next_job_key`].
    pub started_at: JobKey,
    /// Export flavor.
    pub kind: JobKind,
    /// Requested record count; `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_records: Option<u64>,
    /// Requester identity, also the deduplication key.
    pub email: String,
    /// Request parameters.
    pub request: ExportRequest,
    /// Destination of the artifact once claimed; `None` while pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl ExportJob {
    /// Build a new pending job with a fresh start-time key.
    pub fn new(
        kind: JobKind,
        total_records: Option<u64>,
        email: impl Into<String>,
        request: ExportRequest,
    ) -> Self {
        Self {
            started_at: next_job_key(),
            kind,
            total_records,
            email: email.into(),
            request,
            output_path: None,
        }
    }

    /// Whether the job is currently claimed (in-flight).
    pub fn is_claimed(&self) -> bool {
        self.output_path.is_some()
    }
}

static LAST_KEY: AtomicI64 = AtomicI64::new(0);

/// Current time as Unix milliseconds.
pub(crate) fn unix_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Allocate the next job key: the current time in milliseconds, bumped past
/// the previously issued key so two calls in the same millisecond still get
/// distinct, strictly increasing values.
pub fn next_job_key() -> JobKey {
    let now = unix_timestamp_millis();
    let mut last = LAST_KEY.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_KEY.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}
