//! # evalwatch-events
//!
//! Data model for tracking the allocations of a scheduler evaluation.
//!
//! ## Model
//!
//! - An evaluation produces zero or more allocations ([`AllocationStub`])
//! - An [`Allocation`] carries its job definition and a [`TaskState`] per task
//! - A [`TaskState`] carries an append-only, time-ascending [`TaskEvent`] log
//! - A [`Service`] declared by a task may have checks; their live results
//!   are [`HealthCheck`] records from the service-discovery agent
//!
//! All types deserialize from the scheduler and service-discovery JSON APIs.
//! Unknown task states, event types and check statuses are preserved as
//! `Other(..)` rather than rejected.
//!
//! ## Formatting
//!
//! [`format`] turns a task's event log into reverse-chronological,
//! human-readable lines (`<time> | <type> | <description>`).

mod alloc;
pub mod format;
mod types;

pub use alloc::*;
pub use types::*;
