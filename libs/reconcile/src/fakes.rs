//! In-memory cluster for exercising watchers without a scheduler.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use evalwatch_events::{Allocation, AllocationStub, HealthCheck};

use crate::error::QueryError;
use crate::source::{AllocationSource, HealthSource};

/// Replays scripted responses; the last step of a script repeats forever.
#[derive(Default)]
pub struct ScriptedCluster {
    evaluations: HashMap<String, Result<Vec<AllocationStub>, QueryError>>,
    allocations: Mutex<HashMap<String, Script<Allocation>>>,
    checks: Mutex<HashMap<String, Script<Vec<HealthCheck>>>>,
}

struct Script<T> {
    steps: Vec<Result<T, QueryError>>,
    polls: usize,
}

impl<T: Clone> Script<T> {
    fn new(steps: Vec<Result<T, QueryError>>) -> Self {
        assert!(!steps.is_empty(), "script needs at least one step");
        Self { steps, polls: 0 }
    }

    fn next(&mut self) -> Result<T, QueryError> {
        let step = self.polls.min(self.steps.len() - 1);
        self.polls += 1;
        self.steps[step].clone()
    }
}

impl ScriptedCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evaluation(mut self, evaluation_id: &str, stubs: Vec<AllocationStub>) -> Self {
        self.evaluations.insert(evaluation_id.to_string(), Ok(stubs));
        self
    }

    pub fn with_evaluation_error(mut self, evaluation_id: &str, err: QueryError) -> Self {
        self.evaluations.insert(evaluation_id.to_string(), Err(err));
        self
    }

    /// An allocation that never changes.
    pub fn with_allocation(self, alloc: Allocation) -> Self {
        let id = alloc.id.clone();
        self.script_allocation(&id, vec![Ok(alloc)])
    }

    pub fn script_allocation(self, alloc_id: &str, steps: Vec<Result<Allocation, QueryError>>) -> Self {
        self.allocations
            .lock()
            .unwrap()
            .insert(alloc_id.to_string(), Script::new(steps));
        self
    }

    /// Checks of a service that never change.
    pub fn with_checks(self, service: &str, checks: Vec<HealthCheck>) -> Self {
        self.script_checks(service, vec![Ok(checks)])
    }

    pub fn script_checks(self, service: &str, steps: Vec<Result<Vec<HealthCheck>, QueryError>>) -> Self {
        self.checks
            .lock()
            .unwrap()
            .insert(service.to_string(), Script::new(steps));
        self
    }

    pub fn allocation_polls(&self, alloc_id: &str) -> usize {
        self.allocations
            .lock()
            .unwrap()
            .get(alloc_id)
            .map_or(0, |script| script.polls)
    }

    pub fn check_polls(&self, service: &str) -> usize {
        self.checks
            .lock()
            .unwrap()
            .get(service)
            .map_or(0, |script| script.polls)
    }
}

#[async_trait]
impl AllocationSource for ScriptedCluster {
    async fn evaluation_allocations(
        &self,
        evaluation_id: &str,
    ) -> Result<Vec<AllocationStub>, QueryError> {
        self.evaluations
            .get(evaluation_id)
            .cloned()
            .unwrap_or_else(|| Err(QueryError::NotFound(format!("eval {evaluation_id}"))))
    }

    async fn allocation(&self, alloc_id: &str) -> Result<Allocation, QueryError> {
        let mut allocations = self.allocations.lock().unwrap_or_else(|e| e.into_inner());
        match allocations.get_mut(alloc_id) {
            Some(script) => script.next(),
            None => Err(QueryError::NotFound(format!("alloc {alloc_id}"))),
        }
    }
}

#[async_trait]
impl HealthSource for ScriptedCluster {
    async fn service_checks(&self, service: &str) -> Result<Vec<HealthCheck>, QueryError> {
        let mut checks = self.checks.lock().unwrap_or_else(|e| e.into_inner());
        match checks.get_mut(service) {
            Some(script) => script.next(),
            None => Ok(Vec::new()),
        }
    }
}
