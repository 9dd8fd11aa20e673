pub mod config;
pub mod logging;

pub mod artifact;
pub mod control_loop;
pub mod dispatcher;
pub mod executor;
pub mod job;
pub mod queue;
