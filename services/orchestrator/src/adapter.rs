//! Boundary to the per-kind adapters that materialize subsets.
//!
//! Adapters own the concrete sub-workload objects; the orchestrator only
//! tells them the replica count and partition each subset should have.

use async_trait::async_trait;
use fleetset_allocation::RolloutPhase;
use thiserror::Error;

/// Desired state of one subset for this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetTarget {
    pub subset: String,
    pub replicas: i32,
    pub partition: i32,
    pub phase: RolloutPhase,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("subset {subset}: {message}")]
    Failed { subset: String, message: String },
}

/// Realizes subset targets as concrete sub-workload objects.
#[async_trait]
pub trait SubsetAdapter: Send + Sync {
    /// Create or update the sub-workload for `target.subset`.
    async fn apply_subset(&self, workload: &str, target: &SubsetTarget) -> Result<(), AdapterError>;

    /// Remove a sub-workload whose subset is no longer declared.
    async fn delete_subset(&self, workload: &str, subset: &str) -> Result<(), AdapterError>;
}
