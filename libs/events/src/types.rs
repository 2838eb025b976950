//! Task state and task lifecycle event types.
//!
//! Wire names follow the scheduler's JSON API (PascalCase keys, event types
//! as display strings such as `"Failed Validation"`).

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Event Type Constants
// =============================================================================

/// Task event type names as they appear on the wire.
pub mod event_types {
    pub const SETUP: &str = "Task Setup";
    pub const STARTED: &str = "Started";
    pub const RECEIVED: &str = "Received";
    pub const FAILED_VALIDATION: &str = "Failed Validation";
    pub const SETUP_FAILURE: &str = "Setup Failure";
    pub const DRIVER_FAILURE: &str = "Driver Failure";
    pub const DOWNLOADING_ARTIFACTS: &str = "Downloading Artifacts";
    pub const ARTIFACT_DOWNLOAD_FAILED: &str = "Failed Artifact Download";
    pub const KILLING: &str = "Killing";
    pub const KILLED: &str = "Killed";
    pub const TERMINATED: &str = "Terminated";
    pub const RESTARTING: &str = "Restarting";
    pub const NOT_RESTARTING: &str = "Not Restarting";
    pub const SIBLING_FAILED: &str = "Sibling Task Failed";
    pub const SIGNALING: &str = "Signaling";
    pub const RESTART_SIGNAL: &str = "Restart Signaled";
    pub const DRIVER_MESSAGE: &str = "Driver";
    pub const LEADER_DEAD: &str = "Leader Task Dead";
}

/// Restart reason the scheduler reports for an ordinary, in-policy restart.
pub const REASON_WITHIN_POLICY: &str = "Restart within policy";

// =============================================================================
// Status Enums
// =============================================================================

/// Lifecycle event type of a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Setup,
    Started,
    Received,
    FailedValidation,
    SetupFailure,
    DriverFailure,
    DownloadingArtifacts,
    ArtifactDownloadFailed,
    Killing,
    Killed,
    Terminated,
    Restarting,
    NotRestarting,
    SiblingFailed,
    Signaling,
    RestartSignal,
    DriverMessage,
    LeaderDead,
    /// Event type this client does not know about.
    Other(String),
}

impl EventType {
    /// Wire name of the event type.
    pub fn as_str(&self) -> &str {
        use event_types::*;
        match self {
            EventType::Setup => SETUP,
            EventType::Started => STARTED,
            EventType::Received => RECEIVED,
            EventType::FailedValidation => FAILED_VALIDATION,
            EventType::SetupFailure => SETUP_FAILURE,
            EventType::DriverFailure => DRIVER_FAILURE,
            EventType::DownloadingArtifacts => DOWNLOADING_ARTIFACTS,
            EventType::ArtifactDownloadFailed => ARTIFACT_DOWNLOAD_FAILED,
            EventType::Killing => KILLING,
            EventType::Killed => KILLED,
            EventType::Terminated => TERMINATED,
            EventType::Restarting => RESTARTING,
            EventType::NotRestarting => NOT_RESTARTING,
            EventType::SiblingFailed => SIBLING_FAILED,
            EventType::Signaling => SIGNALING,
            EventType::RestartSignal => RESTART_SIGNAL,
            EventType::DriverMessage => DRIVER_MESSAGE,
            EventType::LeaderDead => LEADER_DEAD,
            EventType::Other(name) => name,
        }
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        use event_types::*;
        match value {
            SETUP => EventType::Setup,
            STARTED => EventType::Started,
            RECEIVED => EventType::Received,
            FAILED_VALIDATION => EventType::FailedValidation,
            SETUP_FAILURE => EventType::SetupFailure,
            DRIVER_FAILURE => EventType::DriverFailure,
            DOWNLOADING_ARTIFACTS => EventType::DownloadingArtifacts,
            ARTIFACT_DOWNLOAD_FAILED => EventType::ArtifactDownloadFailed,
            KILLING => EventType::Killing,
            KILLED => EventType::Killed,
            TERMINATED => EventType::Terminated,
            RESTARTING => EventType::Restarting,
            NOT_RESTARTING => EventType::NotRestarting,
            SIBLING_FAILED => EventType::SiblingFailed,
            SIGNALING => EventType::Signaling,
            RESTART_SIGNAL => EventType::RestartSignal,
            DRIVER_MESSAGE => EventType::DriverMessage,
            LEADER_DEAD => EventType::LeaderDead,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match EventType::from(value.as_str()) {
            EventType::Other(_) => EventType::Other(value),
            known => known,
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse state of a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Pending,
    Running,
    Dead,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Dead => "dead",
            TaskStatus::Other(state) => state,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => TaskStatus::Pending,
            "running" => TaskStatus::Running,
            "dead" => TaskStatus::Dead,
            _ => TaskStatus::Other(value),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(value: TaskStatus) -> Self {
        match value {
            TaskStatus::Other(state) => state,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Task State
// =============================================================================

/// A single timestamped lifecycle record of a task.
///
/// Only `event_type` and `time` are always present; the remaining fields are
/// populated depending on the type and default to empty/zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskEvent {
    #[serde(rename = "Type")]
    pub event_type: EventType,

    /// Unix time in nanoseconds.
    pub time: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub validation_error: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub setup_error: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub driver_error: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub download_error: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub kill_reason: String,

    /// Grace period before a force kill, in nanoseconds.
    #[serde(default)]
    pub kill_timeout: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub kill_error: String,

    #[serde(default)]
    pub exit_code: i64,

    #[serde(default)]
    pub signal: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub restart_reason: String,

    /// Delay before the next start attempt, in nanoseconds.
    #[serde(default)]
    pub start_delay: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub failed_sibling: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub task_signal: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub task_signal_reason: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub driver_message: String,
}

impl TaskEvent {
    /// Create an event with every optional field empty.
    pub fn new(event_type: EventType, time: i64) -> Self {
        Self {
            event_type,
            time,
            message: String::new(),
            validation_error: String::new(),
            setup_error: String::new(),
            driver_error: String::new(),
            download_error: String::new(),
            kill_reason: String::new(),
            kill_timeout: 0,
            kill_error: String::new(),
            exit_code: 0,
            signal: 0,
            restart_reason: String::new(),
            start_delay: 0,
            failed_sibling: String::new(),
            task_signal: String::new(),
            task_signal_reason: String::new(),
            driver_message: String::new(),
        }
    }
}

/// Observed state of one task inside an allocation.
///
/// The task name is the key of [`crate::Allocation::task_states`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskState {
    pub state: TaskStatus,

    #[serde(default)]
    pub failed: bool,

    #[serde(default)]
    pub restarts: u64,

    /// Time-ascending event log.
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<TaskEvent>,
}

impl TaskState {
    /// Create a task state with no events, not failed and never restarted.
    pub fn new(state: TaskStatus) -> Self {
        Self {
            state,
            failed: false,
            restarts: 0,
            events: Vec::new(),
        }
    }
}

/// Treat an explicit JSON `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventType::ArtifactDownloadFailed).unwrap(),
            "\"Failed Artifact Download\""
        );
        let parsed: EventType = serde_json::from_str("\"Sibling Task Failed\"").unwrap();
        assert_eq!(parsed, EventType::SiblingFailed);
    }

    #[test]
    fn test_task_setup_wire_name() {
        let parsed: EventType = serde_json::from_str("\"Task Setup\"").unwrap();
        assert_eq!(parsed, EventType::Setup);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"Task Setup\"");
    }

    #[test]
    fn test_unknown_event_type_is_preserved() {
        let parsed: EventType = serde_json::from_str("\"Template Rendered\"").unwrap();
        assert_eq!(parsed, EventType::Other("Template Rendered".to_string()));
        assert_eq!(parsed.to_string(), "Template Rendered");
    }

    #[test]
    fn test_task_status_parsing() {
        let parsed: TaskStatus = serde_json::from_str("\"dead\"").unwrap();
        assert_eq!(parsed, TaskStatus::Dead);

        let parsed: TaskStatus = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(parsed, TaskStatus::Other("unknown".to_string()));
    }

    #[test]
    fn test_task_state_deserialization() {
        let json = r#"{
            "State": "running",
            "Failed": false,
            "Restarts": 2,
            "StartedAt": "2024-01-01T00:00:00Z",
            "Events": [
                {"Type": "Received", "Time": 1000, "Message": ""},
                {"Type": "Terminated", "Time": 2000, "ExitCode": 137, "Signal": 9, "Message": null}
            ]
        }"#;

        let state: TaskState = serde_json::from_str(json).unwrap();
        assert_eq!(state.state, TaskStatus::Running);
        assert_eq!(state.restarts, 2);
        assert_eq!(state.events.len(), 2);
        assert_eq!(state.events[1].exit_code, 137);
        assert_eq!(state.events[1].signal, 9);
        assert!(state.events[1].message.is_empty());
    }

    #[test]
    fn test_null_events_deserialize_as_empty() {
        let state: TaskState = serde_json::from_str(r#"{"State": "pending", "Events": null}"#).unwrap();
        assert_eq!(state.state, TaskStatus::Pending);
        assert!(state.events.is_empty());
        assert!(!state.failed);
    }
}
