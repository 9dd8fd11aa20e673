//! `offex status` – show all queued exports.

use anyhow::Result;
use offex_core::config::OffexConfig;
use offex_core::queue::JobQueue;

/// Reads the record files directly (no recovery pass), so inspecting the
/// queue of a running worker never mutates it.
pub async fn run_status(cfg: &OffexConfig) -> Result<()> {
    let queue = JobQueue::new(&cfg.queue_dir, &cfg.export_dir);
    let jobs = queue.scan_records().await;
    if jobs.is_empty() {
        println!("No queued exports.");
    } else {
        println!(
            "{:<15} {:<8} {:<9} {:<8} {}",
            "KEY", "KIND", "RECORDS", "STATE", "EMAIL"
        );
        for j in jobs {
            let records = j
                .total_records
                .map(|r| format!("{r}"))
                .unwrap_or_else(|| "-".to_string());
            let state = if j.is_claimed() { "claimed" } else { "queued" };
            println!(
                "{:<15} {:<8} {:<9} {:<8} {}",
                j.started_at,
                j.kind.as_str(),
                records,
                state,
                j.email
            );
        }
    }
    Ok(())
}
