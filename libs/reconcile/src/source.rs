//! Query capabilities the watchers poll.
//!
//! Implementations must be safe for concurrent use: one handle is shared by
//! every watcher of an evaluation. No method writes.

use async_trait::async_trait;
use evalwatch_events::{Allocation, AllocationStub, HealthCheck};

use crate::error::QueryError;

/// Read access to the scheduler.
#[async_trait]
pub trait AllocationSource: Send + Sync {
    /// Allocations created by an evaluation.
    async fn evaluation_allocations(
        &self,
        evaluation_id: &str,
    ) -> Result<Vec<AllocationStub>, QueryError>;

    /// Current state of one allocation, including its job definition.
    async fn allocation(&self, alloc_id: &str) -> Result<Allocation, QueryError>;
}

/// Read access to the service-discovery agent.
#[async_trait]
pub trait HealthSource: Send + Sync {
    /// Current results of every check registered for a service.
    async fn service_checks(&self, service: &str) -> Result<Vec<HealthCheck>, QueryError>;
}
