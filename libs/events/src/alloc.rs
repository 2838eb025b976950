//! Allocations, job definitions, services and health check results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{null_as_default, TaskState};

/// Length of the allocation ID prefix shown in reports.
pub const SHORT_ID_LEN: usize = 8;

/// Allocation as listed under an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllocationStub {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "JobID", default)]
    pub job_id: String,

    #[serde(default)]
    pub task_group: String,

    #[serde(default)]
    pub client_status: String,
}

impl AllocationStub {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            job_id: String::new(),
            task_group: String::new(),
            client_status: String::new(),
        }
    }
}

/// Full allocation: the job it runs and the live state of its tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Allocation {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "JobID", default)]
    pub job_id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub job: Job,

    /// Task name to observed state, ordered by task name.
    ///
    /// Empty while the allocation has not been picked up by a client yet.
    #[serde(default, deserialize_with = "null_as_default")]
    pub task_states: BTreeMap<String, TaskState>,
}

impl Allocation {
    pub fn new(id: impl Into<String>, job: Job) -> Self {
        Self {
            id: id.into(),
            job_id: job.id.clone(),
            job,
            task_states: BTreeMap::new(),
        }
    }

    /// Add or replace the state of a task.
    pub fn with_task(mut self, name: impl Into<String>, state: TaskState) -> Self {
        self.task_states.insert(name.into(), state);
        self
    }

    /// Allocation ID truncated to [`SHORT_ID_LEN`] characters.
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// Truncate an ID to at most [`SHORT_ID_LEN`] characters.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Job definition embedded in an allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    #[serde(rename = "ID", default)]
    pub id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub task_groups: Vec<TaskGroup>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            task_groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: TaskGroup) -> Self {
        self.task_groups.push(group);
        self
    }

    /// Every service declared by a task of this job that has at least one
    /// check, in declaration order.
    pub fn checked_services(&self) -> impl Iterator<Item = &Service> + '_ {
        self.task_groups
            .iter()
            .flat_map(|group| group.tasks.iter())
            .flat_map(|task| task.services.iter())
            .filter(|service| service.has_checks())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskGroup {
    #[serde(default)]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<Task>,
}

impl TaskGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Task {
    #[serde(default)]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub services: Vec<Service>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: Vec::new(),
        }
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }
}

/// Service registered by a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Service {
    #[serde(default)]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub checks: Vec<ServiceCheck>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checks: Vec::new(),
        }
    }

    pub fn with_check(mut self, check: ServiceCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// Services without checks are never watched.
    pub fn has_checks(&self) -> bool {
        !self.checks.is_empty()
    }
}

/// Declared health check of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceCheck {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "Type", default)]
    pub check_type: String,
}

impl ServiceCheck {
    pub fn new(name: impl Into<String>, check_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            check_type: check_type.into(),
        }
    }
}

/// Status of a health check as reported by the service-discovery agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CheckStatus {
    Passing,
    Warning,
    Critical,
    Other(String),
}

impl CheckStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CheckStatus::Passing => "passing",
            CheckStatus::Warning => "warning",
            CheckStatus::Critical => "critical",
            CheckStatus::Other(status) => status,
        }
    }

    pub fn is_passing(&self) -> bool {
        matches!(self, CheckStatus::Passing)
    }
}

impl From<String> for CheckStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "passing" => CheckStatus::Passing,
            "warning" => CheckStatus::Warning,
            "critical" => CheckStatus::Critical,
            _ => CheckStatus::Other(value),
        }
    }
}

impl From<CheckStatus> for String {
    fn from(value: CheckStatus) -> Self {
        match value {
            CheckStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Live result of one health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    #[serde(default)]
    pub node: String,

    #[serde(rename = "CheckID", default)]
    pub check_id: String,

    #[serde(default)]
    pub name: String,

    pub status: CheckStatus,

    #[serde(rename = "ServiceID", default)]
    pub service_id: String,

    #[serde(default)]
    pub service_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub output: String,
}

impl HealthCheck {
    pub fn new(service_name: impl Into<String>, status: CheckStatus) -> Self {
        let service_name = service_name.into();
        Self {
            node: String::new(),
            check_id: format!("service:{service_name}"),
            name: format!("Service '{service_name}' check"),
            status,
            service_id: service_name.clone(),
            service_name,
            output: String::new(),
        }
    }
}
