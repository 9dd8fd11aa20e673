//! CLI for the offex export queue manager.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use offex_core::config::OffexConfig;

use commands::{run_add, run_completions, run_remove, run_scheduler, run_status};

/// Top-level CLI for the offex export queue manager.
#[derive(Debug, Parser)]
#[command(name = "offex")]
#[command(about = "offex: persistent offline export job queue", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a new export job.
    Add {
        /// Requester email address.
        email: String,

        /// Query expression selecting the records to export.
        query: String,

        /// Base name for the artifact file.
        #[arg(long, default_value = "export")]
        file_name: String,

        /// Export kind: "index" or "archive".
        #[arg(long, default_value = "index")]
        kind: String,

        /// Expected number of records (omit when unknown).
        #[arg(long)]
        records: Option<u64>,
    },

    /// Run the worker loops until interrupted, processing queued jobs.
    Run,

    /// Show all queued exports.
    Status,

    /// Remove a queued export by its key.
    Remove {
        /// Job key (millisecond timestamp, as shown by status).
        key: i64,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate for.
        shell: clap_complete::Shell,
    },
}

impl CliCommand {
    pub async fn run(self, cfg: OffexConfig) -> Result<()> {
        tracing::debug!("loaded config: {:?}", cfg);

        match self {
            CliCommand::Add {
                email,
                query,
                file_name,
                kind,
                records,
            } => run_add(&cfg, &email, &query, &file_name, &kind, records).await?,
            CliCommand::Run => run_scheduler(&cfg).await?,
            CliCommand::Status => run_status(&cfg).await?,
            CliCommand::Remove { key } => run_remove(&cfg, key).await?,
            CliCommand::Completions { shell } => run_completions(shell),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
