//! Queue lifecycle state.

use std::collections::VecDeque;

use crate::job::ExportJob;

/// Lifecycle of the persistent queue.
///
/// `Uninitialized` keeps producers from racing the startup recovery scan;
/// `Accepting` is the normal running state; `Closed` stops admission while
/// claiming and removal stay usable so in-flight jobs can finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Uninitialized,
    Accepting,
    Closed,
}

/// Everything guarded by the queue's lock: the lifecycle state and the
/// ordered collection of job records.
pub(super) struct QueueInner {
    pub(super) state: QueueState,
    pub(super) jobs: VecDeque<ExportJob>,
}

impl QueueInner {
    pub(super) fn new() -> Self {
        Self {
            state: QueueState::Uninitialized,
            jobs: VecDeque::new(),
        }
    }
}
