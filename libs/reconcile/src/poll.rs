//! Polling cadence and transient-error backoff.
//!
//! Watchers describe *what* to fetch and *how to judge* a snapshot; this
//! module decides *when* to fetch again.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{QueryError, WatchError};
use crate::progress::{Progress, ProgressSink};

/// Default interval between polls of the same object.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default upper bound for the backoff after query errors.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Default number of consecutive retryable errors tolerated per query.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// How often to poll and how to back off on transient query errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between a non-terminal snapshot and the next fetch.
    pub interval: Duration,

    /// Cap for the exponential backoff.
    pub max_backoff: Duration,

    /// Retryable errors in a row before the watcher gives up.
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_backoff: DEFAULT_MAX_BACKOFF,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

impl PollPolicy {
    /// Policy with the given interval and default error handling.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Delay after the `consecutive_errors`-th error in a row (1-based):
    /// `interval * 2^(n-1)`, capped at `max_backoff`.
    pub fn backoff(&self, consecutive_errors: u32) -> Duration {
        let exponent = consecutive_errors.saturating_sub(1).min(20);
        self.interval
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff.max(self.interval))
    }
}

/// Run `fetch` until it succeeds, backing off on retryable errors.
pub(crate) async fn fetch_retrying<T, F, Fut>(
    policy: &PollPolicy,
    target: &str,
    progress: &ProgressSink,
    mut fetch: F,
) -> Result<T, WatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, QueryError>>,
{
    let mut consecutive_errors = 0u32;

    loop {
        match fetch().await {
            Ok(value) => return Ok(value),
            Err(source) if source.is_retryable() => {
                consecutive_errors += 1;
                if consecutive_errors > policy.max_consecutive_errors {
                    return Err(WatchError::Unavailable {
                        target: target.to_string(),
                        attempts: consecutive_errors,
                        source,
                    });
                }

                let delay = policy.backoff(consecutive_errors);
                warn!(
                    query = %target,
                    attempt = consecutive_errors,
                    delay_ms = delay.as_millis() as u64,
                    error = %source,
                    "Query failed, will retry"
                );
                progress.emit(Progress::QueryRetry {
                    target: target.to_string(),
                    attempt: consecutive_errors,
                    error: source.to_string(),
                });
                sleep(delay).await;
            }
            Err(source) => {
                return Err(WatchError::Query {
                    target: target.to_string(),
                    source,
                })
            }
        }
    }
}

/// Fetch snapshots every `policy.interval` until `decide` returns a value or
/// an error.
pub(crate) async fn poll_until<S, T, F, Fut, D>(
    policy: &PollPolicy,
    target: &str,
    progress: &ProgressSink,
    mut fetch: F,
    mut decide: D,
) -> Result<T, WatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, QueryError>>,
    D: FnMut(S) -> Result<Option<T>, WatchError>,
{
    let mut polls = 0u64;

    loop {
        let snapshot = fetch_retrying(policy, target, progress, &mut fetch).await?;
        polls += 1;

        if let Some(done) = decide(snapshot)? {
            debug!(query = %target, polls, "Poll settled");
            return Ok(done);
        }

        debug!(query = %target, polls, "Not settled yet");
        sleep(policy.interval).await;
    }
}
