//! Final state report, re-read after convergence.

use std::sync::Arc;

use evalwatch_events::format::format_task_events;
use evalwatch_events::{AllocationStub, CheckStatus, TaskStatus};
use tracing::debug;

use crate::error::ReportError;
use crate::source::{AllocationSource, HealthSource};

/// One row per task of every allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub job: String,
    /// Allocation ID prefix.
    pub alloc_id: String,
    pub task: String,
    pub state: TaskStatus,
    pub failed: bool,
    pub restarts: u64,
    /// Formatted event lines, most recent first, joined by newlines.
    pub events: String,
}

/// One row per check result of every checked service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRow {
    pub service: String,
    pub status: CheckStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub tasks: Vec<TaskRow>,
    pub services: Vec<ServiceRow>,
}

/// Re-fetches allocation and check state once, without retries.
pub struct ReportBuilder {
    allocations: Arc<dyn AllocationSource>,
    health: Arc<dyn HealthSource>,
}

impl ReportBuilder {
    pub fn new(allocations: Arc<dyn AllocationSource>, health: Arc<dyn HealthSource>) -> Self {
        Self {
            allocations,
            health,
        }
    }

    /// Build the report for the allocations listed in `snapshot`.
    ///
    /// The first failing query aborts the whole report.
    pub async fn build(&self, snapshot: &[AllocationStub]) -> Result<Report, ReportError> {
        let mut report = Report::default();

        for stub in snapshot {
            let alloc = self
                .allocations
                .allocation(&stub.id)
                .await
                .map_err(|source| ReportError::Fetch {
                    target: format!("allocation {}", stub.id),
                    source,
                })?;

            let job = if alloc.job.name.is_empty() {
                alloc.job_id.clone()
            } else {
                alloc.job.name.clone()
            };

            for (task, state) in &alloc.task_states {
                report.tasks.push(TaskRow {
                    job: job.clone(),
                    alloc_id: alloc.short_id().to_string(),
                    task: task.clone(),
                    state: state.state.clone(),
                    failed: state.failed,
                    restarts: state.restarts,
                    events: format_task_events(state).join("\n"),
                });
            }

            for service in alloc.job.checked_services() {
                let checks = self
                    .health
                    .service_checks(&service.name)
                    .await
                    .map_err(|source| ReportError::Fetch {
                        target: format!("service {}", service.name),
                        source,
                    })?;

                report
                    .services
                    .extend(checks.into_iter().map(|check| ServiceRow {
                        service: service.name.clone(),
                        status: check.status,
                    }));
            }
        }

        debug!(
            tasks = report.tasks.len(),
            services = report.services.len(),
            "Report built"
        );
        Ok(report)
    }
}
