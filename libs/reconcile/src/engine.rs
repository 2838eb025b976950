//! Deadline-bounded convergence of every allocation of an evaluation.
//!
//! One task per allocation runs in a [`JoinSet`] owned by the engine. Once an
//! allocation is running, its task fans out again into one service watcher
//! per checked service, held in a nested `JoinSet`. Dropping either set
//! cancels everything below it.

use std::sync::Arc;
use std::time::Duration;

use evalwatch_events::AllocationStub;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use crate::error::{ConvergeError, WatchError};
use crate::poll::{fetch_retrying, PollPolicy};
use crate::progress::{Progress, ProgressSink};
use crate::source::{AllocationSource, HealthSource};
use crate::watch::{AllocationWatcher, ServiceWatcher};

/// Stand-in deadline for durations too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// How an evaluation ended.
#[derive(Debug)]
pub enum Outcome {
    /// Every allocation runs and every checked service passes.
    Succeeded,

    /// A task died or a query could not be answered.
    Failed(WatchError),

    /// The deadline elapsed first. Lists allocations that had not converged.
    TimedOut { pending: Vec<String> },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }
}

/// Result of [`ConvergenceEngine::converge`].
#[derive(Debug)]
pub struct Convergence {
    pub evaluation_id: String,

    /// Allocations listed when the evaluation was first queried.
    pub snapshot: Vec<AllocationStub>,

    pub outcome: Outcome,

    /// Allocations that fully converged, in completion order.
    pub converged: Vec<String>,

    pub elapsed: Duration,
}

/// Watches the allocations of one evaluation until they all converge, one
/// of them fails, or the deadline passes.
pub struct ConvergenceEngine {
    allocations: Arc<dyn AllocationSource>,
    health: Arc<dyn HealthSource>,
    policy: PollPolicy,
    progress: ProgressSink,
}

impl ConvergenceEngine {
    pub fn new(allocations: Arc<dyn AllocationSource>, health: Arc<dyn HealthSource>) -> Self {
        Self {
            allocations,
            health,
            policy: PollPolicy::default(),
            progress: ProgressSink::disabled(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Publish [`Progress`] to `tx` while converging.
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<Progress>) -> Self {
        self.progress = ProgressSink::new(tx);
        self
    }

    /// Run one evaluation to a terminal [`Outcome`].
    ///
    /// Only a failed snapshot query or a panicking watcher is an `Err`;
    /// task failures and timeouts are outcomes.
    pub async fn converge(
        &self,
        evaluation_id: &str,
        deadline: Duration,
    ) -> Result<Convergence, ConvergeError> {
        let started = Instant::now();
        let deadline_at = started
            .checked_add(deadline)
            .unwrap_or_else(|| started + FAR_FUTURE);

        let snapshot = self
            .allocations
            .evaluation_allocations(evaluation_id)
            .await
            .map_err(|source| ConvergeError::Snapshot {
                evaluation_id: evaluation_id.to_string(),
                source,
            })?;

        info!(
            evaluation_id,
            allocations = snapshot.len(),
            deadline_ms = deadline.as_millis() as u64,
            "Watching evaluation"
        );
        self.progress.emit(Progress::Snapshot {
            evaluation_id: evaluation_id.to_string(),
            allocations: snapshot.len(),
        });

        let mut watchers = JoinSet::new();
        for stub in &snapshot {
            watchers.spawn(self.allocation_task().run(stub.id.clone()));
        }

        let mut aggregator = Aggregator::new(snapshot.len());
        while aggregator.verdict() == Verdict::Undecided {
            tokio::select! {
                biased;

                Some(joined) = watchers.join_next() => aggregator.record(joined?),
                _ = sleep_until(deadline_at) => aggregator.deadline_passed = true,
            }

            if Instant::now() >= deadline_at {
                aggregator.deadline_passed = true;
            }
            if aggregator.deadline_passed {
                // Results that landed at the deadline instant still count.
                while let Some(joined) = watchers.try_join_next() {
                    aggregator.record(joined?);
                }
            }
        }

        let elapsed = started.elapsed();
        watchers.shutdown().await;

        let converged = aggregator.converged.clone();
        let outcome = aggregator.into_outcome(&snapshot);
        match &outcome {
            Outcome::Succeeded => info!(evaluation_id, ?elapsed, "Evaluation converged"),
            Outcome::Failed(err) => warn!(evaluation_id, error = %err, "Evaluation failed"),
            Outcome::TimedOut { pending } => warn!(
                evaluation_id,
                pending = pending.len(),
                "Evaluation timed out"
            ),
        }

        Ok(Convergence {
            evaluation_id: evaluation_id.to_string(),
            snapshot,
            outcome,
            converged,
            elapsed,
        })
    }

    fn allocation_task(&self) -> AllocationTask {
        AllocationTask {
            allocations: self.allocations.clone(),
            health: self.health.clone(),
            policy: self.policy.clone(),
            progress: self.progress.clone(),
        }
    }
}

/// Everything one allocation's watcher task owns.
struct AllocationTask {
    allocations: Arc<dyn AllocationSource>,
    health: Arc<dyn HealthSource>,
    policy: PollPolicy,
    progress: ProgressSink,
}

impl AllocationTask {
    /// Wait for the tasks to run, then for every checked service to pass.
    async fn run(self, alloc_id: String) -> Result<String, WatchError> {
        let readiness =
            AllocationWatcher::new(self.allocations.clone(), self.policy.clone(), self.progress.clone());

        if let Err(err) = readiness.wait_until_running(&alloc_id).await {
            if let WatchError::TaskDead { task, state, .. } = &err {
                self.progress.emit(Progress::AllocationFailed {
                    alloc_id: alloc_id.clone(),
                    task: task.clone(),
                    state: state.clone(),
                });
            }
            return Err(err);
        }
        self.progress.emit(Progress::AllocationRunning {
            alloc_id: alloc_id.clone(),
        });

        let target = format!("allocation {alloc_id}");
        let alloc = fetch_retrying(&self.policy, &target, &self.progress, || {
            self.allocations.allocation(&alloc_id)
        })
        .await?;

        let mut services = JoinSet::new();
        for service in alloc.job.checked_services() {
            let watcher =
                ServiceWatcher::new(self.health.clone(), self.policy.clone(), self.progress.clone());
            let name = service.name.clone();
            services.spawn(async move {
                watcher.wait_until_passing(&name).await?;
                Ok::<_, WatchError>(name)
            });
        }

        while let Some(joined) = services.join_next().await {
            let service = match joined {
                Ok(result) => result?,
                // Service watchers are only ever cancelled by dropping the set.
                Err(err) => std::panic::resume_unwind(err.into_panic()),
            };
            self.progress.emit(Progress::ServicePassing {
                alloc_id: alloc_id.clone(),
                service,
            });
        }

        info!(alloc_id = %alloc_id, "Allocation converged");
        self.progress.emit(Progress::AllocationConverged {
            alloc_id: alloc_id.clone(),
        });
        Ok(alloc_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Undecided,
    Failed,
    TimedOut,
    Succeeded,
}

/// Folds watcher results and the deadline into a verdict.
///
/// When several signals are present at once: failure, then timeout, then
/// success.
#[derive(Debug)]
struct Aggregator {
    expected: usize,
    converged: Vec<String>,
    failure: Option<WatchError>,
    deadline_passed: bool,
}

impl Aggregator {
    fn new(expected: usize) -> Self {
        Self {
            expected,
            converged: Vec::new(),
            failure: None,
            deadline_passed: false,
        }
    }

    fn record(&mut self, result: Result<String, WatchError>) {
        match result {
            Ok(alloc_id) => self.converged.push(alloc_id),
            Err(err) if self.failure.is_none() => self.failure = Some(err),
            Err(err) => warn!(error = %err, "Additional watcher failure"),
        }
    }

    fn verdict(&self) -> Verdict {
        if self.failure.is_some() {
            Verdict::Failed
        } else if self.deadline_passed {
            Verdict::TimedOut
        } else if self.converged.len() >= self.expected {
            Verdict::Succeeded
        } else {
            Verdict::Undecided
        }
    }

    fn into_outcome(self, snapshot: &[AllocationStub]) -> Outcome {
        let verdict = self.verdict();
        match (verdict, self.failure) {
            (_, Some(err)) => Outcome::Failed(err),
            (Verdict::TimedOut, None) => Outcome::TimedOut {
                pending: snapshot
                    .iter()
                    .filter(|stub| !self.converged.contains(&stub.id))
                    .map(|stub| stub.id.clone())
                    .collect(),
            },
            _ => Outcome::Succeeded,
        }
    }
}
