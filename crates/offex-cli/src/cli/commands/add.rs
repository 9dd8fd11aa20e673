//! `offex add <email> <query>` – queue a new export job.

use anyhow::{bail, Result};
use offex_core::config::OffexConfig;
use offex_core::job::{ExportJob, ExportRequest, JobKind};
use offex_core::queue::JobQueue;

pub async fn run_add(
    cfg: &OffexConfig,
    email: &str,
    query: &str,
    file_name: &str,
    kind: &str,
    records: Option<u64>,
) -> Result<()> {
    let Some(kind) = JobKind::from_str(kind) else {
        bail!("unknown export kind {kind:?}, expected \"index\" or \"archive\"");
    };

    let queue = JobQueue::new(&cfg.queue_dir, &cfg.export_dir);
    queue.open().await;

    let job = ExportJob::new(
        kind,
        records,
        email,
        ExportRequest {
            query: query.to_string(),
            file_name: file_name.to_string(),
        },
    );
    if let Some(existing) = queue.find_duplicate(&job).await {
        bail!(
            "an identical export is already queued (key {})",
            existing.started_at
        );
    }

    let key = job.started_at;
    queue.enqueue(job).await;

    // enqueue is silent on write failure; confirm the record became
    // visible before reporting success.
    if queue.list_all().await.iter().any(|j| j.started_at == key) {
        println!("Queued export {key} for {email}");
        Ok(())
    } else {
        bail!("export was not queued, see log for details");
    }
}
