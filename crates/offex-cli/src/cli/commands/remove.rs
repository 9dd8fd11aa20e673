//! `offex remove <key>` – remove a queued export by its key.

use anyhow::Result;
use offex_core::config::OffexConfig;
use offex_core::queue::JobQueue;

/// Opens the queue (running recovery) and removes the record with the given
/// key. Removal is idempotent: a missing key reports and succeeds.
pub async fn run_remove(cfg: &OffexConfig, key: i64) -> Result<()> {
    let queue = JobQueue::new(&cfg.queue_dir, &cfg.export_dir);
    queue.open().await;

    let Some(job) = queue
        .list_all()
        .await
        .into_iter()
        .find(|j| j.started_at == key)
    else {
        println!("No queued export with key {key}");
        return Ok(());
    };

    queue.remove(&job).await;
    println!("Removed export {key}");
    Ok(())
}
