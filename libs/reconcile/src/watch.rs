//! Per-allocation readiness and per-service health watchers.

use std::collections::BTreeMap;
use std::sync::Arc;

use evalwatch_events::{TaskState, TaskStatus};
use tracing::{debug, info};

use crate::error::WatchError;
use crate::health::all_passing;
use crate::poll::{poll_until, PollPolicy};
use crate::progress::ProgressSink;
use crate::source::{AllocationSource, HealthSource};

/// Verdict on one snapshot of an allocation's task states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Every task is running.
    Ready,

    /// Tasks are missing, pending or in an unrecognised state.
    NotReady,

    /// A task is dead.
    Failed { task: String, state: TaskStatus },
}

/// Judge one snapshot of task states.
///
/// A dead task anywhere wins over pending tasks elsewhere, so the verdict
/// does not depend on map order.
pub fn evaluate_readiness(task_states: &BTreeMap<String, TaskState>) -> Readiness {
    if task_states.is_empty() {
        return Readiness::NotReady;
    }

    if let Some((task, state)) = task_states
        .iter()
        .find(|(_, state)| state.state == TaskStatus::Dead)
    {
        return Readiness::Failed {
            task: task.clone(),
            state: state.state.clone(),
        };
    }

    if task_states
        .values()
        .all(|state| state.state == TaskStatus::Running)
    {
        Readiness::Ready
    } else {
        Readiness::NotReady
    }
}

/// Polls one allocation until all of its tasks are running.
#[derive(Clone)]
pub struct AllocationWatcher {
    source: Arc<dyn AllocationSource>,
    policy: PollPolicy,
    progress: ProgressSink,
}

impl AllocationWatcher {
    pub fn new(source: Arc<dyn AllocationSource>, policy: PollPolicy, progress: ProgressSink) -> Self {
        Self {
            source,
            policy,
            progress,
        }
    }

    /// Resolve once every task runs; fail as soon as one is dead.
    pub async fn wait_until_running(&self, alloc_id: &str) -> Result<(), WatchError> {
        let target = format!("allocation {alloc_id}");
        debug!(alloc_id, "Watching allocation");

        poll_until(
            &self.policy,
            &target,
            &self.progress,
            || self.source.allocation(alloc_id),
            |alloc| match evaluate_readiness(&alloc.task_states) {
                Readiness::Ready => Ok(Some(())),
                Readiness::NotReady => Ok(None),
                Readiness::Failed { task, state } => Err(WatchError::TaskDead {
                    alloc_id: alloc_id.to_string(),
                    task,
                    state,
                }),
            },
        )
        .await?;

        info!(alloc_id, "Allocation running");
        Ok(())
    }
}

/// Polls one service until every one of its checks is passing.
///
/// There is no failure verdict: a critical check may still recover.
#[derive(Clone)]
pub struct ServiceWatcher {
    source: Arc<dyn HealthSource>,
    policy: PollPolicy,
    progress: ProgressSink,
}

impl ServiceWatcher {
    pub fn new(source: Arc<dyn HealthSource>, policy: PollPolicy, progress: ProgressSink) -> Self {
        Self {
            source,
            policy,
            progress,
        }
    }

    pub async fn wait_until_passing(&self, service: &str) -> Result<(), WatchError> {
        let target = format!("service {service}");
        debug!(service, "Watching service checks");

        poll_until(
            &self.policy,
            &target,
            &self.progress,
            || self.source.service_checks(service),
            |checks| Ok(all_passing(&checks).then_some(())),
        )
        .await?;

        info!(service, "Service checks passing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::fakes::ScriptedCluster;
    use evalwatch_events::{Allocation, CheckStatus, HealthCheck, Job};
    use rstest::rstest;
    use std::time::Duration;

    fn states(entries: &[(&str, TaskStatus)]) -> BTreeMap<String, TaskState> {
        entries
            .iter()
            .map(|(name, status)| (name.to_string(), TaskState::new(status.clone())))
            .collect()
    }

    fn alloc(id: &str, entries: &[(&str, TaskStatus)]) -> Allocation {
        let mut alloc = Allocation::new(id, Job::new("web"));
        alloc.task_states = states(entries);
        alloc
    }

    #[rstest]
    #[case(&[], Readiness::NotReady)]
    #[case(&[("web", TaskStatus::Running)], Readiness::Ready)]
    #[case(&[("web", TaskStatus::Running), ("log", TaskStatus::Pending)], Readiness::NotReady)]
    #[case(&[("web", TaskStatus::Other("unknown".into()))], Readiness::NotReady)]
    #[case(
        &[("a", TaskStatus::Pending), ("z", TaskStatus::Dead)],
        Readiness::Failed { task: "z".into(), state: TaskStatus::Dead }
    )]
    fn test_evaluate_readiness(#[case] entries: &[(&str, TaskStatus)], #[case] expected: Readiness) {
        assert_eq!(evaluate_readiness(&states(entries)), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_allocation_watcher_waits_for_running() {
        let cluster = Arc::new(ScriptedCluster::new().script_allocation(
            "a1",
            vec![
                Ok(alloc("a1", &[])),
                Ok(alloc("a1", &[("web", TaskStatus::Pending)])),
                Ok(alloc("a1", &[("web", TaskStatus::Running)])),
            ],
        ));

        let watcher = AllocationWatcher::new(
            cluster.clone(),
            PollPolicy::with_interval(Duration::from_secs(1)),
            ProgressSink::disabled(),
        );
        watcher.wait_until_running("a1").await.unwrap();
        assert_eq!(cluster.allocation_polls("a1"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_allocation_watcher_dead_task_is_hard_failure() {
        let cluster = Arc::new(ScriptedCluster::new().script_allocation(
            "a1",
            vec![
                Ok(alloc("a1", &[("web", TaskStatus::Pending)])),
                Ok(alloc("a1", &[("web", TaskStatus::Dead)])),
            ],
        ));

        let watcher =
            AllocationWatcher::new(cluster, PollPolicy::default(), ProgressSink::disabled());
        let err = watcher.wait_until_running("a1").await.unwrap_err();
        match err {
            WatchError::TaskDead {
                alloc_id, task, ..
            } => {
                assert_eq!(alloc_id, "a1");
                assert_eq!(task, "web");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_allocation_watcher_survives_transient_errors() {
        let cluster = Arc::new(ScriptedCluster::new().script_allocation(
            "a1",
            vec![
                Err(QueryError::Transport("connection reset".into())),
                Ok(alloc("a1", &[("web", TaskStatus::Running)])),
            ],
        ));

        let watcher =
            AllocationWatcher::new(cluster, PollPolicy::default(), ProgressSink::disabled());
        watcher.wait_until_running("a1").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_watcher_polls_until_passing() {
        let cluster = Arc::new(ScriptedCluster::new().script_checks(
            "web-http",
            vec![
                Ok(vec![HealthCheck::new("web-http", CheckStatus::Critical)]),
                Ok(vec![
                    HealthCheck::new("web-http", CheckStatus::Passing),
                    HealthCheck::new("web-http", CheckStatus::Warning),
                ]),
                Ok(vec![
                    HealthCheck::new("web-http", CheckStatus::Passing),
                    HealthCheck::new("web-http", CheckStatus::Passing),
                ]),
            ],
        ));

        let watcher =
            ServiceWatcher::new(cluster.clone(), PollPolicy::default(), ProgressSink::disabled());
        watcher.wait_until_passing("web-http").await.unwrap();
        assert_eq!(cluster.check_polls("web-http"), 3);
    }
}
