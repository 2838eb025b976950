//! Progress notifications published while an evaluation converges.

use evalwatch_events::TaskStatus;
use tokio::sync::mpsc;

/// A notable step of a running evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// The allocation snapshot was fetched.
    Snapshot {
        evaluation_id: String,
        allocations: usize,
    },

    /// Every task of the allocation is running.
    AllocationRunning { alloc_id: String },

    /// A task of the allocation is dead.
    AllocationFailed {
        alloc_id: String,
        task: String,
        state: TaskStatus,
    },

    /// Every check of a service of the allocation is passing.
    ServicePassing { alloc_id: String, service: String },

    /// The allocation and all of its checked services converged.
    AllocationConverged { alloc_id: String },

    /// A retryable query error; the query will be repeated.
    QueryRetry {
        target: String,
        attempt: u32,
        error: String,
    },
}

/// Publishes [`Progress`] when a listener is attached; otherwise a no-op.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<Progress>>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::UnboundedSender<Progress>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, progress: Progress) {
        if let Some(tx) = &self.tx {
            // The listener going away never affects convergence.
            let _ = tx.send(progress);
        }
    }
}
