//! `offex run` – run the worker control loops until interrupted.

use anyhow::{bail, Result};
use offex_core::config::OffexConfig;
use offex_core::control_loop::ControlLoop;
use offex_core::executor::{CommandExecutor, ExportExecutor};
use offex_core::queue::JobQueue;
use std::sync::Arc;
use tokio::sync::watch;

pub async fn run_scheduler(cfg: &OffexConfig) -> Result<()> {
    if cfg.export_command.is_empty() {
        bail!("export_command is not configured; set it in config.toml");
    }

    let queue = Arc::new(JobQueue::new(&cfg.queue_dir, &cfg.export_dir));
    let recovered = queue.open().await;
    if recovered > 0 {
        tracing::info!("recovered {} queued export(s) from previous run", recovered);
    }

    let executor: Arc<dyn ExportExecutor> = Arc::new(CommandExecutor::new(
        Arc::clone(&queue),
        cfg.export_command.clone(),
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut loops = Vec::new();
    for class in cfg.worker_classes() {
        let mut control = ControlLoop::new(
            class,
            Arc::clone(&queue),
            Arc::clone(&executor),
            shutdown_rx.clone(),
        );
        loops.push(tokio::spawn(async move { control.run().await }));
    }
    drop(shutdown_rx);

    println!(
        "Processing export queue with {} worker class(es); Ctrl-C to stop.",
        loops.len()
    );
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("could not wait for interrupt: {}", e);
    }
    tracing::info!("interrupt received, draining worker loops");
    let _ = shutdown_tx.send(true);

    for handle in loops {
        let _ = handle.await;
    }
    queue.close().await;
    println!("All worker loops drained.");
    Ok(())
}
