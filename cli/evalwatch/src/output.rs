//! Terminal output: progress lines, report tables and the final verdict.

use std::time::Duration;

use colored::{ColoredString, Colorize};
use evalwatch_events::{CheckStatus, TaskStatus};
use evalwatch_reconcile::{Convergence, Outcome, Progress, Report, ServiceRow, TaskRow, WatchError};
use tabled::{Table, Tabled};

#[derive(Debug, Tabled)]
struct TaskLine {
    #[tabled(rename = "Job")]
    job: String,

    #[tabled(rename = "Alloc-ID")]
    alloc_id: String,

    #[tabled(rename = "Task")]
    task: String,

    #[tabled(rename = "State")]
    state: String,

    #[tabled(rename = "Failed")]
    failed: bool,

    #[tabled(rename = "Restarts")]
    restarts: u64,

    #[tabled(rename = "Events")]
    events: String,
}

impl From<&TaskRow> for TaskLine {
    fn from(row: &TaskRow) -> Self {
        Self {
            job: row.job.clone(),
            alloc_id: row.alloc_id.clone(),
            task: row.task.clone(),
            state: task_status(&row.state).to_string(),
            failed: row.failed,
            restarts: row.restarts,
            events: row.events.clone(),
        }
    }
}

#[derive(Debug, Tabled)]
struct ServiceLine {
    #[tabled(rename = "Service")]
    service: String,

    #[tabled(rename = "Status")]
    status: String,
}

impl From<&ServiceRow> for ServiceLine {
    fn from(row: &ServiceRow) -> Self {
        Self {
            service: row.service.clone(),
            status: check_status(&row.status).to_string(),
        }
    }
}

fn task_status(status: &TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Dead => status.as_str().red(),
        TaskStatus::Pending => status.as_str().yellow(),
        TaskStatus::Running => status.as_str().green(),
        TaskStatus::Other(state) => state.normal(),
    }
}

fn check_status(status: &CheckStatus) -> ColoredString {
    match status {
        CheckStatus::Critical => status.as_str().red(),
        CheckStatus::Warning => status.as_str().yellow(),
        CheckStatus::Passing => status.as_str().green(),
        CheckStatus::Other(state) => state.dimmed(),
    }
}

/// Render the task table and the service table.
pub fn render_report(report: &Report) -> (String, String) {
    let tasks: Vec<TaskLine> = report.tasks.iter().map(TaskLine::from).collect();
    let services: Vec<ServiceLine> = report.services.iter().map(ServiceLine::from).collect();
    (Table::new(tasks).to_string(), Table::new(services).to_string())
}

pub fn print_report(report: &Report) {
    let (tasks, services) = render_report(report);
    println!("{}", tasks);
    println!("{}", services);
}

/// One line of running commentary, if the event is worth printing.
pub fn progress_line(progress: &Progress) -> Option<String> {
    match progress {
        Progress::Snapshot {
            evaluation_id,
            allocations,
        } => Some(format!(
            "evaluation {} has {} allocations",
            evaluation_id.yellow().bold(),
            allocations.to_string().green().bold()
        )),
        Progress::AllocationRunning { alloc_id } => {
            Some(format!("{} {}", "Allocation running:".green(), alloc_id))
        }
        Progress::AllocationFailed {
            alloc_id,
            task,
            state,
        } => Some(format!(
            "{} task {} is {}",
            format!("Allocation {alloc_id} error:").red(),
            task,
            state
        )),
        Progress::QueryRetry {
            target,
            attempt,
            error,
        } => Some(format!(
            "{} {} (attempt {}): {}",
            "Retrying".yellow(),
            target,
            attempt,
            error
        )),
        Progress::ServicePassing { .. } | Progress::AllocationConverged { .. } => None,
    }
}

pub fn print_progress(progress: &Progress) {
    if let Some(line) = progress_line(progress) {
        println!("{}", line);
    }
}

/// Allocations still outstanding when the deadline passed.
pub fn print_timed_out(pending: &[String]) {
    for alloc_id in pending {
        println!("{} {}", "Allocation timed out:".red(), alloc_id);
    }
}

/// Final verdict line.
pub fn outcome_line(convergence: &Convergence, deadline: Duration) -> String {
    match &convergence.outcome {
        Outcome::Succeeded => format!(
            "{} All allocations for evaluation {} are running",
            "Done!".green(),
            convergence.evaluation_id
        ),
        Outcome::TimedOut { .. } => format!(
            "{} Allocations did not finish running within deadline of {} seconds",
            "Timeout!".red(),
            deadline.as_secs_f64().to_string().red()
        ),
        Outcome::Failed(WatchError::TaskDead { alloc_id, task, .. }) => format!(
            "{} Allocation {} task {} is dead",
            "Failed!".red(),
            alloc_id,
            task
        ),
        Outcome::Failed(err) => format!("{} {}", "Failed!".red(), err),
    }
}

pub fn print_outcome(convergence: &Convergence, deadline: Duration) {
    println!("{}", outcome_line(convergence, deadline));
}
