//! Execution collaborators: how a claimed job becomes an artifact.
//!
//! The queue and control loop only decide *which* job runs *when*; the
//! actual export work lives behind [`ExportExecutor`].

mod command;

pub use command::CommandExecutor;

use async_trait::async_trait;

use crate::dispatcher::CapacityToken;
use crate::job::ExportJob;

/// Produces the export artifact for one claimed job.
///
/// `execute` owns the job's [`CapacityToken`] for the whole run; the token
/// (and with it the worker slot) is released when `execute` returns or when
/// its task is cancelled mid-flight. Implementations are responsible for
/// removing the job from the queue on success, and for leaving it claimed
/// on failure so the next restart's recovery retries it.
#[async_trait]
pub trait ExportExecutor: Send + Sync {
    async fn execute(&self, job: ExportJob, token: CapacityToken) -> anyhow::Result<()>;
}
