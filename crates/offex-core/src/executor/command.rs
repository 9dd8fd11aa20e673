//! Subprocess-backed export executor.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::dispatcher::CapacityToken;
use crate::job::ExportJob;
use crate::queue::JobQueue;

use super::ExportExecutor;

/// Runs a configured external command once per job to produce the artifact.
///
/// The job is described to the child through environment variables
/// (`OFFEX_EMAIL`, `OFFEX_QUERY`, `OFFEX_KIND`, and `OFFEX_RECORDS` when the
/// job is bounded); the output path is appended as the final argument. Exit
/// 0 removes the job from the queue. Any failure deletes the partial
/// artifact and leaves the job claimed, so a process restart resets and
/// retries it.
pub struct CommandExecutor {
    queue: Arc<JobQueue>,
    command: Vec<String>,
}

impl CommandExecutor {
    /// Build an executor around `command` (program plus leading arguments).
    pub fn new(queue: Arc<JobQueue>, command: Vec<String>) -> Result<Self> {
        if command.is_empty() {
            anyhow::bail!("export command is empty");
        }
        Ok(Self { queue, command })
    }

    async fn run_command(&self, job: &ExportJob, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..])
            .arg(output)
            .env("OFFEX_EMAIL", &job.email)
            .env("OFFEX_QUERY", &job.request.query)
            .env("OFFEX_KIND", job.kind.as_str())
            .stdin(Stdio::null());
        if let Some(n) = job.total_records {
            cmd.env("OFFEX_RECORDS", n.to_string());
        }

        let status = cmd
            .status()
            .await
            .with_context(|| format!("spawn export command {:?}", self.command[0]))?;
        if !status.success() {
            anyhow::bail!("export command exited with {status}");
        }
        Ok(())
    }
}

#[async_trait]
impl ExportExecutor for CommandExecutor {
    async fn execute(&self, job: ExportJob, _token: CapacityToken) -> Result<()> {
        let output = job
            .output_path
            .clone()
            .context("job submitted without an output path")?;

        tracing::info!(
            started_at = job.started_at,
            kind = job.kind.as_str(),
            path = %output.display(),
            "starting export"
        );

        match self.run_command(&job, &output).await {
            Ok(()) => {
                tracing::info!(started_at = job.started_at, path = %output.display(), "export completed");
                self.queue.remove(&job).await;
                Ok(())
            }
            Err(e) => {
                // Whatever the child left behind is unverifiable.
                match tokio::fs::remove_file(&output).await {
                    Ok(()) => {}
                    Err(io) if io.kind() == std::io::ErrorKind::NotFound => {}
                    Err(io) => {
                        tracing::warn!(path = %output.display(), "could not delete partial artifact: {}", io);
                    }
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::job::{ExportRequest, JobKind};
    use std::time::Duration;
    use tempfile::TempDir;

    async fn claimed_job(queue: &JobQueue, email: &str) -> ExportJob {
        queue
            .enqueue(ExportJob::new(
                JobKind::Index,
                Some(10),
                email,
                ExportRequest {
                    query: "taxon:falco".into(),
                    file_name: "out".into(),
                },
            ))
            .await;
        queue.claim_next(None, None).await.expect("claimable")
    }

    async fn token() -> CapacityToken {
        let dispatcher = Dispatcher::new(1, Duration::ZERO, None, None);
        dispatcher.reserve(Duration::from_millis(50)).await.unwrap()
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".into(), "-c".into(), script.into()]
    }

    #[tokio::test]
    async fn successful_export_removes_job() {
        let tmp = TempDir::new().unwrap();
        let queue = Arc::new(JobQueue::new(
            tmp.path().join("queue"),
            tmp.path().join("exports"),
        ));
        queue.open().await;
        let job = claimed_job(&queue, "a@x.org").await;
        let output = job.output_path.clone().unwrap();

        // The output path arrives as the trailing argument ($0 under sh -c).
        let executor = CommandExecutor::new(queue.clone(), sh("printf data > \"$0\"")).unwrap();
        executor.execute(job, token().await).await.unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "data");
        assert_eq!(queue.count().await, 0);
    }

    #[tokio::test]
    async fn job_description_reaches_the_child() {
        let tmp = TempDir::new().unwrap();
        let queue = Arc::new(JobQueue::new(
            tmp.path().join("queue"),
            tmp.path().join("exports"),
        ));
        queue.open().await;
        let job = claimed_job(&queue, "env@x.org").await;
        let output = job.output_path.clone().unwrap();

        let executor = CommandExecutor::new(
            queue.clone(),
            sh("printf '%s %s %s %s' \"$OFFEX_EMAIL\" \"$OFFEX_KIND\" \"$OFFEX_RECORDS\" \"$OFFEX_QUERY\" > \"$0\""),
        )
        .unwrap();
        executor.execute(job, token().await).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "env@x.org index 10 taxon:falco"
        );
    }

    #[tokio::test]
    async fn failed_export_discards_partial_and_keeps_job() {
        let tmp = TempDir::new().unwrap();
        let queue = Arc::new(JobQueue::new(
            tmp.path().join("queue"),
            tmp.path().join("exports"),
        ));
        queue.open().await;
        let job = claimed_job(&queue, "a@x.org").await;
        let output = job.output_path.clone().unwrap();

        let executor =
            CommandExecutor::new(queue.clone(), sh("printf partial > \"$0\"; exit 3")).unwrap();
        let err = executor.execute(job, token().await).await.unwrap_err();
        assert!(err.to_string().contains("exited with"));

        assert!(!output.exists());
        // Still queued and still claimed: recovery after restart retries it.
        let all = queue.list_all().await;
        assert_eq!(all.len(), 1);
        assert!(all[0].is_claimed());
    }

    #[tokio::test]
    async fn unspawnable_command_keeps_job() {
        let tmp = TempDir::new().unwrap();
        let queue = Arc::new(JobQueue::new(
            tmp.path().join("queue"),
            tmp.path().join("exports"),
        ));
        queue.open().await;
        let job = claimed_job(&queue, "a@x.org").await;

        let executor = CommandExecutor::new(
            queue.clone(),
            vec!["/nonexistent/offex-export-helper".into()],
        )
        .unwrap();
        assert!(executor.execute(job, token().await).await.is_err());
        assert_eq!(queue.count().await, 1);
    }

    #[test]
    fn empty_command_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let queue = Arc::new(JobQueue::new(
            tmp.path().join("queue"),
            tmp.path().join("exports"),
        ));
        assert!(CommandExecutor::new(queue, Vec::new()).is_err());
    }
}
