use clap::Parser;
use offex_core::{config, logging};

mod cli;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Initialize logging as early as possible; fall back to stderr when the
    // state directory is unavailable.
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    let cfg = match config::load_or_init() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("offex error: {:#}", err);
            std::process::exit(1);
        }
    };

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(nice) = cfg.effective_worker_nice() {
        builder.on_thread_start(move || renice_current_thread(nice));
    }

    let outcome = match builder.build() {
        Ok(runtime) => runtime.block_on(cli.command.run(cfg)),
        Err(err) => Err(err.into()),
    };
    if let Err(err) = outcome {
        eprintln!("offex error: {:#}", err);
        std::process::exit(1);
    }
}

/// Apply `nice` to the calling thread (tid 0 selects the caller).
#[cfg(unix)]
fn renice_current_thread(nice: i32) {
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
    if rc != 0 {
        tracing::debug!(nice, "setpriority failed: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn renice_current_thread(_nice: i32) {}
