//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use fleetset_allocation::WorkloadSpec;
use fleetset_orchestrator::{
    AdapterError, AllocationEvent, EventRecorder, StatusClient, StatusError, SubsetAdapter,
    SubsetTarget, Workload,
};

/// Workload store with status-subresource semantics.
///
/// `update_status` only persists the status, bumps `resource_version`,
/// and rejects stale versions.
#[derive(Default)]
pub struct MemoryStatusClient {
    inner: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    workloads: BTreeMap<String, Workload>,
    /// Remaining updates that bump the stored version before checking.
    concurrent_writes: u32,
    /// Spec to install on the next concurrent write, if any.
    concurrent_spec: Option<WorkloadSpec>,
    backend_error: Option<String>,
    update_calls: u32,
}

impl MemoryStatusClient {
    pub fn with_workload(workload: Workload) -> Self {
        let client = Self::default();
        client.insert(workload);
        client
    }

    pub fn insert(&self, workload: Workload) {
        let mut state = self.inner.lock().unwrap();
        state.workloads.insert(workload.name.clone(), workload);
    }

    /// Simulate `n` writers racing in between fetch and update.
    pub fn inject_conflicts(&self, n: u32) {
        self.inner.lock().unwrap().concurrent_writes = n;
    }

    /// Have the next racing writer also change the spec.
    pub fn inject_spec_change(&self, spec: WorkloadSpec) {
        let mut state = self.inner.lock().unwrap();
        state.concurrent_writes = state.concurrent_writes.max(1);
        state.concurrent_spec = Some(spec);
    }

    pub fn fail_updates(&self, message: &str) {
        self.inner.lock().unwrap().backend_error = Some(message.to_string());
    }

    pub fn stored(&self, name: &str) -> Workload {
        self.inner.lock().unwrap().workloads[name].clone()
    }

    pub fn update_calls(&self) -> u32 {
        self.inner.lock().unwrap().update_calls
    }
}

#[async_trait]
impl StatusClient for MemoryStatusClient {
    async fn get(&self, name: &str) -> Result<Workload, StatusError> {
        let state = self.inner.lock().unwrap();
        state
            .workloads
            .get(name)
            .cloned()
            .ok_or_else(|| StatusError::NotFound(name.to_string()))
    }

    async fn update_status(&self, workload: &Workload) -> Result<Workload, StatusError> {
        let mut state = self.inner.lock().unwrap();
        state.update_calls += 1;

        if let Some(message) = &state.backend_error {
            return Err(StatusError::Backend(message.clone()));
        }

        let racing = state.concurrent_writes > 0;
        if racing {
            state.concurrent_writes -= 1;
        }
        let racing_spec = if racing { state.concurrent_spec.take() } else { None };

        let stored = state
            .workloads
            .get_mut(&workload.name)
            .ok_or_else(|| StatusError::NotFound(workload.name.clone()))?;

        if racing {
            stored.resource_version += 1;
            if let Some(spec) = racing_spec {
                stored.spec = spec;
                stored.generation += 1;
            }
        }

        if stored.resource_version != workload.resource_version {
            return Err(StatusError::Conflict(workload.name.clone()));
        }

        stored.status = workload.status.clone();
        stored.resource_version += 1;
        Ok(stored.clone())
    }
}

/// Adapter that records every call and can fail chosen subsets.
#[derive(Default)]
pub struct RecordingAdapter {
    applied: Mutex<Vec<SubsetTarget>>,
    deleted: Mutex<Vec<String>>,
    failing: Mutex<Vec<String>>,
}

impl RecordingAdapter {
    pub fn fail_subset(&self, subset: &str) {
        self.failing.lock().unwrap().push(subset.to_string());
    }

    pub fn applied(&self) -> Vec<SubsetTarget> {
        self.applied.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn check(&self, subset: &str) -> Result<(), AdapterError> {
        if self.failing.lock().unwrap().iter().any(|s| s == subset) {
            return Err(AdapterError::Failed {
                subset: subset.to_string(),
                message: "sub-workload rejected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SubsetAdapter for RecordingAdapter {
    async fn apply_subset(&self, _workload: &str, target: &SubsetTarget) -> Result<(), AdapterError> {
        self.check(&target.subset)?;
        self.applied.lock().unwrap().push(target.clone());
        Ok(())
    }

    async fn delete_subset(&self, _workload: &str, subset: &str) -> Result<(), AdapterError> {
        self.check(subset)?;
        self.deleted.lock().unwrap().push(subset.to_string());
        Ok(())
    }
}

/// Recorder that keeps events for inspection.
#[derive(Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<AllocationEvent>>,
}

impl MemoryRecorder {
    pub fn events(&self) -> Vec<AllocationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(&self, event: AllocationEvent) {
        self.events.lock().unwrap().push(event);
    }
}
