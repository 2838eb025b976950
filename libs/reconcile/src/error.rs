//! Error types for querying and convergence.

use evalwatch_events::TaskStatus;
use thiserror::Error;

/// Failure of a single state query against the scheduler or the
/// service-discovery agent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Connection refused, reset, timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The queried object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl QueryError {
    /// Whether the same query may succeed if repeated later.
    pub fn is_retryable(&self) -> bool {
        match self {
            QueryError::Transport(_) => true,
            QueryError::Status { status, .. } => *status == 429 || *status >= 500,
            QueryError::NotFound(_) | QueryError::Decode(_) => false,
        }
    }
}

/// Terminal failure of a watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    /// A task of the allocation reached `dead`.
    #[error("allocation {alloc_id}: task {task} is {state}")]
    TaskDead {
        alloc_id: String,
        task: String,
        state: TaskStatus,
    },

    /// A non-retryable query error.
    #[error("{target}: {source}")]
    Query {
        target: String,
        #[source]
        source: QueryError,
    },

    /// Retryable query errors exhausted the consecutive-error budget.
    #[error("{target}: unavailable after {attempts} attempts: {source}")]
    Unavailable {
        target: String,
        attempts: u32,
        #[source]
        source: QueryError,
    },
}

impl WatchError {
    /// Whether this is a domain failure rather than an infrastructure one.
    pub fn is_task_failure(&self) -> bool {
        matches!(self, WatchError::TaskDead { .. })
    }
}

/// Errors that prevent the engine from reaching any outcome.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// The allocation snapshot of the evaluation could not be fetched.
    #[error("failed to list allocations of evaluation {evaluation_id}: {source}")]
    Snapshot {
        evaluation_id: String,
        #[source]
        source: QueryError,
    },

    /// A watcher task panicked.
    #[error("watcher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Errors while re-reading state for the final report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to fetch {target} for report: {source}")]
    Fetch {
        target: String,
        #[source]
        source: QueryError,
    },
}
