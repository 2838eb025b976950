//! Readiness convergence for the allocations of one evaluation.
//!
//! This library watches the allocations produced by a scheduler evaluation
//! until they are all running and healthy. Key concepts:
//!
//! - **Snapshot**: the allocations listed for the evaluation, fetched once.
//! - **Readiness**: every task of an allocation is `running`; a `dead` task
//!   is a hard failure.
//! - **Health**: every check of every checked service of a running
//!   allocation is `passing`.
//! - **Convergence**: all allocations ready and healthy before the deadline.
//!
//! # Invariants
//!
//! - Watchers only read; the query sources are shared by all of them
//! - A failure or the deadline cancels every outstanding watcher
//! - Failure beats timeout, timeout beats success

mod engine;
mod error;
mod health;
mod poll;
mod progress;
mod report;
mod source;
mod watch;

#[cfg(test)]
mod fakes;

use std::time::Duration;

pub use engine::{Convergence, ConvergenceEngine, Outcome};
pub use error::{ConvergeError, QueryError, ReportError, WatchError};
pub use health::all_passing;
pub use poll::{PollPolicy, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_CONSECUTIVE_ERRORS, DEFAULT_POLL_INTERVAL};
pub use progress::{Progress, ProgressSink};
pub use report::{Report, ReportBuilder, ServiceRow, TaskRow};
pub use source::{AllocationSource, HealthSource};
pub use watch::{evaluate_readiness, AllocationWatcher, Readiness, ServiceWatcher};

/// Default time allowed for an evaluation to converge.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);
