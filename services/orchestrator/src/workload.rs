//! The workload object as seen by the status collaborator.
//!
//! The spec is owned by the user; the orchestrator only ever writes
//! [`WorkloadStatus`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fleetset_allocation::WorkloadSpec;
use serde::{Deserialize, Serialize};

/// A stored workload with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,

    /// Bumped on every spec change.
    pub generation: i64,

    /// Opaque version used to detect concurrent writes.
    pub resource_version: u64,

    pub spec: WorkloadSpec,

    #[serde(default)]
    pub status: WorkloadStatus,
}

impl Workload {
    pub fn new(name: impl Into<String>, spec: WorkloadSpec) -> Self {
        Self {
            name: name.into(),
            generation: 1,
            resource_version: 1,
            spec,
            status: WorkloadStatus::default(),
        }
    }

    /// Partitions written by the previous pass, if any.
    pub fn current_partitions(&self) -> BTreeMap<String, i32> {
        self.status
            .update_status
            .as_ref()
            .map(|u| u.current_partitions.clone())
            .unwrap_or_default()
    }
}

/// Rollout progress recorded by the last pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UpdateStatus {
    pub current_partitions: BTreeMap<String, i32>,
}

/// Observed state written back after each pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkloadStatus {
    pub observed_generation: i64,

    /// Sum of all subset targets.
    pub replicas: i32,

    #[serde(default)]
    pub subset_replicas: BTreeMap<String, i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_status: Option<UpdateStatus>,

    #[serde(default)]
    pub conditions: Vec<WorkloadCondition>,
}

/// Condition types reported on the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    /// Every subset's desired state was handed to its adapter.
    SubsetProvisioned,
    /// No subset is holding replicas on the old revision.
    SubsetUpdated,
    /// Schedulability could not be fully honored.
    AllocationDegraded,
    /// Subset minimums fit within the total.
    ConstraintsFeasible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

impl WorkloadStatus {
    pub fn condition(&self, condition_type: ConditionType) -> Option<&WorkloadCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    /// Insert or update a condition.
    ///
    /// The transition time only moves when the status flips.
    pub fn set_condition(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        let message = message.into();
        match self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition_type)
        {
            Some(existing) => {
                if existing.status != status {
                    existing.last_transition_time = now;
                }
                existing.status = status;
                existing.reason = reason.to_string();
                existing.message = message;
            }
            None => self.conditions.push(WorkloadCondition {
                condition_type,
                status,
                reason: reason.to_string(),
                message,
                last_transition_time: now,
            }),
        }
    }
}
