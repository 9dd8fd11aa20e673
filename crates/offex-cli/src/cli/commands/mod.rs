//! CLI command handlers. Each command is in its own file for clarity.

mod add;
mod completions;
mod remove;
mod run;
mod status;

pub use add::run_add;
pub use completions::run_completions;
pub use remove::run_remove;
pub use run::run_scheduler;
pub use status::run_status;
