//! Human-readable rendering of task event logs.
//!
//! A task's event log is stored time-ascending; rendered lines are
//! time-descending (most recent first). Each line has the shape
//! `<time> | <event type> | <description>`.

use chrono::{Local, TimeZone};

use crate::types::{EventType, TaskEvent, TaskState, REASON_WITHIN_POLICY};

/// Timestamp layout used in event lines.
///
/// `%Z` is the zone name only for [`chrono::Utc`] (`03/05/24 07:08:09 UTC`);
/// [`Local`] and fixed offsets render the numeric offset instead
/// (`03/05/24 09:08:09 +02:00`).
pub const TIME_FORMAT: &str = "%m/%d/%y %H:%M:%S %Z";

/// Render a task's events in local time, most recent first.
pub fn format_task_events(state: &TaskState) -> Vec<String> {
    format_events_in(&state.events, &Local)
}

/// Render events in the given time zone, most recent first.
pub fn format_events_in<Tz>(events: &[TaskEvent], tz: &Tz) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    events
        .iter()
        .rev()
        .map(|event| {
            format!(
                "{} | {} | {}",
                format_timestamp(event.time, tz),
                event.event_type,
                describe(event)
            )
        })
        .collect()
}

/// Render a unix-nanosecond timestamp with [`TIME_FORMAT`].
pub fn format_timestamp<Tz>(nanos: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    tz.timestamp_nanos(nanos).format(TIME_FORMAT).to_string()
}

/// Describe a single event. Unknown event types describe as empty.
pub fn describe(event: &TaskEvent) -> String {
    match &event.event_type {
        EventType::Setup => event.message.clone(),
        EventType::Started => "Task started by client".to_string(),
        EventType::Received => "Task received by client".to_string(),
        EventType::FailedValidation => {
            or_default(&event.validation_error, "Validation of task failed")
        }
        EventType::SetupFailure => or_default(&event.setup_error, "Task setup failed"),
        EventType::DriverFailure => or_default(&event.driver_error, "Failed to start task"),
        EventType::DownloadingArtifacts => "Client is downloading artifacts".to_string(),
        EventType::ArtifactDownloadFailed => {
            or_default(&event.download_error, "Failed to download artifacts")
        }
        EventType::Killing => {
            if !event.kill_reason.is_empty() {
                format!("Killing task: {}", event.kill_reason)
            } else if event.kill_timeout != 0 {
                format!(
                    "Sent interrupt. Waiting {} before force killing",
                    compact_duration(event.kill_timeout)
                )
            } else {
                "Sent interrupt".to_string()
            }
        }
        EventType::Killed => or_default(&event.kill_error, "Task successfully killed"),
        EventType::Terminated => {
            let mut parts = vec![format!("Exit Code: {}", event.exit_code)];
            if event.signal != 0 {
                parts.push(format!("Signal: {}", event.signal));
            }
            if !event.message.is_empty() {
                parts.push(format!("Exit Message: {:?}", event.message));
            }
            parts.join(", ")
        }
        EventType::Restarting => {
            let restart_in = format!(
                "Task restarting in {}",
                compact_duration(event.start_delay)
            );
            if !event.restart_reason.is_empty() && event.restart_reason != REASON_WITHIN_POLICY {
                format!("{} - {}", event.restart_reason, restart_in)
            } else {
                restart_in
            }
        }
        EventType::NotRestarting => {
            or_default(&event.restart_reason, "Task exceeded restart policy")
        }
        EventType::SiblingFailed => {
            if event.failed_sibling.is_empty() {
                "Task's sibling failed".to_string()
            } else {
                format!("Task's sibling {:?} failed", event.failed_sibling)
            }
        }
        EventType::Signaling => {
            match (event.task_signal.as_str(), event.task_signal_reason.as_str()) {
                ("", "") => "Task being sent a signal".to_string(),
                ("", reason) => reason.to_string(),
                (signal, "") => format!("Task being sent signal {signal}"),
                (signal, reason) => format!("Task being sent signal {signal}: {reason}"),
            }
        }
        EventType::RestartSignal => or_default(&event.restart_reason, "Task signaled to restart"),
        EventType::DriverMessage => event.driver_message.clone(),
        EventType::LeaderDead => "Leader Task in Group dead".to_string(),
        EventType::Other(_) => String::new(),
    }
}

fn or_default(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;
const NANOS_PER_MIN: u64 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MIN;

/// Render a nanosecond duration in compact unit form.
///
/// Sub-second values use a single unit (`750ns`, `1.5µs`, `250ms`); longer
/// values spell out hours, minutes and fractional seconds (`15s`, `1m30s`,
/// `1h0m0s`).
pub fn compact_duration(nanos: i64) -> String {
    let sign = if nanos < 0 { "-" } else { "" };
    let n = nanos.unsigned_abs();

    let body = if n == 0 {
        "0s".to_string()
    } else if n < NANOS_PER_MICRO {
        format!("{n}ns")
    } else if n < NANOS_PER_MILLI {
        format!("{}µs", with_fraction(n, NANOS_PER_MICRO, 3))
    } else if n < NANOS_PER_SEC {
        format!("{}ms", with_fraction(n, NANOS_PER_MILLI, 6))
    } else {
        let hours = n / NANOS_PER_HOUR;
        let minutes = (n % NANOS_PER_HOUR) / NANOS_PER_MIN;
        let seconds = with_fraction(n % NANOS_PER_MIN, NANOS_PER_SEC, 9);
        if hours > 0 {
            format!("{hours}h{minutes}m{seconds}s")
        } else if minutes > 0 {
            format!("{minutes}m{seconds}s")
        } else {
            format!("{seconds}s")
        }
    };

    format!("{sign}{body}")
}

/// `value / unit` with the remainder as a trimmed decimal fraction.
fn with_fraction(value: u64, unit: u64, digits: usize) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0digits$}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}
