use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::job::JobKind;

/// One worker-class section (`[[workers]]` in config.toml). Every field is
/// optional; missing values take the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerClassToml {
    /// Number of jobs this class runs concurrently. Values below 1 are
    /// treated as 1.
    pub concurrency: Option<usize>,
    /// Delay between queue polls, in milliseconds.
    pub poll_delay_ms: Option<u64>,
    /// Delay applied after claiming a job, before it starts executing.
    pub execution_delay_ms: Option<u64>,
    /// How long a graceful drain waits before in-flight jobs are abandoned.
    pub shutdown_grace_ms: Option<u64>,
    /// Largest `total_records` this class will claim (None = unrestricted).
    pub max_records: Option<u64>,
    /// Job kind this class is limited to: "index" or "archive" (None = any).
    pub kind: Option<JobKind>,
}

/// Normalized per-class settings, ready for a control loop.
#[derive(Debug, Clone)]
pub struct WorkerClassConfig {
    pub concurrency: usize,
    pub poll_delay: Duration,
    pub execution_delay: Duration,
    pub max_records: Option<u64>,
    pub kind: Option<JobKind>,
    pub shutdown_grace: Duration,
}

impl Default for WorkerClassConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_delay: Duration::from_millis(10),
            execution_delay: Duration::ZERO,
            max_records: None,
            kind: None,
            shutdown_grace: Duration::from_millis(3000),
        }
    }
}

impl WorkerClassToml {
    pub fn normalize(&self) -> WorkerClassConfig {
        let defaults = WorkerClassConfig::default();
        WorkerClassConfig {
            concurrency: self.concurrency.unwrap_or(1).max(1),
            poll_delay: self
                .poll_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_delay),
            execution_delay: self
                .execution_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.execution_delay),
            max_records: self.max_records,
            kind: self.kind,
            shutdown_grace: self
                .shutdown_grace_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_grace),
        }
    }
}

/// Global configuration loaded from `~/.config/offex/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffexConfig {
    /// Directory holding one JSON record per queued job.
    #[serde(default = "default_queue_dir")]
    pub queue_dir: PathBuf,
    /// Root directory under which export artifacts are produced.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    /// Command that produces one export artifact; the artifact path is
    /// appended as the final argument.
    #[serde(default)]
    pub export_command: Vec<String>,
    /// Optional niceness applied to worker threads (clamped to -20..=19).
    #[serde(default)]
    pub worker_nice: Option<i64>,
    /// Worker classes; if none are configured, a single unrestricted class
    /// with the built-in defaults is used.
    #[serde(default)]
    pub workers: Vec<WorkerClassToml>,
}

impl Default for OffexConfig {
    fn default() -> Self {
        Self {
            queue_dir: default_queue_dir(),
            export_dir: default_export_dir(),
            export_command: Vec::new(),
            worker_nice: None,
            workers: Vec::new(),
        }
    }
}

impl OffexConfig {
    /// Normalized worker classes, falling back to one unrestricted class.
    pub fn worker_classes(&self) -> Vec<WorkerClassConfig> {
        if self.workers.is_empty() {
            return vec![WorkerClassConfig::default()];
        }
        self.workers.iter().map(WorkerClassToml::normalize).collect()
    }

    /// Worker niceness clamped to the valid range, if configured.
    pub fn effective_worker_nice(&self) -> Option<i32> {
        self.worker_nice.map(|n| n.clamp(-20, 19) as i32)
    }
}

fn default_queue_dir() -> PathBuf {
    match xdg::BaseDirectories::with_prefix("offex") {
        Ok(dirs) => dirs.get_data_home().join("queue"),
        Err(_) => PathBuf::from("offex-queue"),
    }
}

fn default_export_dir() -> PathBuf {
    match xdg::BaseDirectories::with_prefix("offex") {
        Ok(dirs) => dirs.get_data_home().join("exports"),
        Err(_) => PathBuf::from("offex-exports"),
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("offex")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<OffexConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = OffexConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: OffexConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = OffexConfig::default();
        assert!(cfg.export_command.is_empty());
        assert!(cfg.worker_nice.is_none());
        assert!(cfg.workers.is_empty());
        assert_eq!(cfg.worker_classes().len(), 1);
    }

    #[test]
    fn worker_class_defaults() {
        let class = WorkerClassToml::default().normalize();
        assert_eq!(class.concurrency, 1);
        assert_eq!(class.poll_delay, Duration::from_millis(10));
        assert_eq!(class.execution_delay, Duration::ZERO);
        assert_eq!(class.shutdown_grace, Duration::from_millis(3000));
        assert!(class.max_records.is_none());
        assert!(class.kind.is_none());
    }

    #[test]
    fn worker_class_concurrency_is_at_least_one() {
        let class = WorkerClassToml {
            concurrency: Some(0),
            ..Default::default()
        }
        .normalize();
        assert_eq!(class.concurrency, 1);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = OffexConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: OffexConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.queue_dir, cfg.queue_dir);
        assert_eq!(parsed.export_dir, cfg.export_dir);
        assert_eq!(parsed.export_command, cfg.export_command);
    }

    #[test]
    fn config_toml_worker_tables() {
        let toml = r#"
            queue_dir = "/var/lib/offex/queue"
            export_dir = "/srv/exports"
            export_command = ["/usr/local/bin/make-export", "--zip"]
            worker_nice = 30

            [[workers]]
            concurrency = 4
            poll_delay_ms = 25
            max_records = 100
            kind = "index"

            [[workers]]
            shutdown_grace_ms = 500
        "#;
        let cfg: OffexConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.queue_dir, PathBuf::from("/var/lib/offex/queue"));
        assert_eq!(cfg.export_command.len(), 2);
        assert_eq!(cfg.effective_worker_nice(), Some(19));

        let classes = cfg.worker_classes();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].concurrency, 4);
        assert_eq!(classes[0].poll_delay, Duration::from_millis(25));
        assert_eq!(classes[0].max_records, Some(100));
        assert_eq!(classes[0].kind, Some(JobKind::Index));
        assert_eq!(classes[1].concurrency, 1);
        assert_eq!(classes[1].shutdown_grace, Duration::from_millis(500));
        assert!(classes[1].kind.is_none());
    }

    #[test]
    fn config_toml_minimal_file() {
        let cfg: OffexConfig = toml::from_str("").unwrap();
        assert!(cfg.export_command.is_empty());
        assert_eq!(cfg.worker_classes().len(), 1);
    }
}
