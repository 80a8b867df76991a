//! One reconciliation pass over a workload.
//!
//! A pass:
//! - Fetches the workload and (optionally) validates its spec
//! - Allocates replicas across subsets from the live status snapshot
//! - Computes rollout partitions, honoring manual overrides
//! - Hands each subset target to the adapter, removing dropped subsets
//! - Records events and writes the workload status back
//!
//! Adapter failures do not abort the pass; they are reported in the
//! outcome and the `SubsetProvisioned` condition.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use fleetset_allocation::{
    next_update, rollout_phases, Allocation, AllocationError, Partitions, ReplicaAllocator,
    RolloutPhase, SubsetSnapshot, SubsetStatus, WorkloadSpec,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::adapter::{SubsetAdapter, SubsetTarget};
use crate::config::Config;
use crate::events::{reasons, AllocationEvent, EventRecorder};
use crate::status::{update_status_with_retry, StatusClient, StatusError};
use crate::validation::validate_workload_spec;
use crate::workload::{ConditionStatus, ConditionType, UpdateStatus, Workload};

/// Errors that abort a pass.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    #[error("status error: {0}")]
    Status(#[from] StatusError),
}

/// Everything computed for a workload in one pass, before any side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub allocation: Allocation,
    pub partitions: Partitions,
    /// Phase of every subset in the spec or the live status.
    pub phases: BTreeMap<String, RolloutPhase>,
}

impl ReconcilePlan {
    /// Targets for every desired subset, in name order.
    pub fn targets(&self) -> Vec<SubsetTarget> {
        self.allocation
            .targets
            .iter()
            .map(|(name, &replicas)| SubsetTarget {
                subset: name.clone(),
                replicas,
                partition: self.partitions.get(name).copied().unwrap_or(0),
                phase: self
                    .phases
                    .get(name)
                    .copied()
                    .unwrap_or(RolloutPhase::Growing),
            })
            .collect()
    }

    /// Subsets with live status but no place in the allocation.
    pub fn removed(&self) -> Vec<String> {
        self.phases
            .iter()
            .filter(|(_, phase)| **phase == RolloutPhase::Removed)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// True when no subset keeps replicas on the old revision.
    pub fn fully_updated(&self) -> bool {
        self.partitions.values().all(|&p| p == 0)
    }
}

/// Compute allocation, partitions and phases without side effects.
///
/// The previous partition of a subset is the one reported by its live
/// status, falling back to the one recorded by the last pass.
pub fn plan(
    spec: &WorkloadSpec,
    statuses: &BTreeMap<String, SubsetStatus>,
    previous_partitions: &BTreeMap<String, i32>,
) -> Result<ReconcilePlan, AllocationError> {
    let allocation = ReplicaAllocator::new(spec).alloc(statuses)?;

    let current: BTreeMap<String, SubsetSnapshot> = statuses
        .iter()
        .map(|(name, status)| {
            let mut snapshot = SubsetSnapshot::from(status);
            if snapshot.partition.is_none() {
                snapshot.partition = previous_partitions.get(name).copied();
            }
            (name.clone(), snapshot)
        })
        .collect();

    let partitions = next_update(spec, &current, &allocation.targets);
    let phases = rollout_phases(&current, &allocation.targets);

    Ok(ReconcilePlan {
        allocation,
        partitions,
        phases,
    })
}

/// Result of a completed pass.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub plan: ReconcilePlan,
    /// Subsets whose target was applied.
    pub applied: Vec<String>,
    /// Subsets removed because they left the spec.
    pub deleted: Vec<String>,
    /// Subsets whose adapter call failed.
    pub failed: Vec<String>,
    /// The workload as written back.
    pub workload: Workload,
}

/// Drives reconciliation passes against external collaborators.
pub struct Orchestrator {
    config: Config,
    status: Arc<dyn StatusClient>,
    adapter: Arc<dyn SubsetAdapter>,
    recorder: Arc<dyn EventRecorder>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        status: Arc<dyn StatusClient>,
        adapter: Arc<dyn SubsetAdapter>,
        recorder: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            config,
            status,
            adapter,
            recorder,
        }
    }

    /// Run one pass for the workload `name` against a live status snapshot.
    #[instrument(skip(self, statuses), fields(subsets = statuses.len()))]
    pub async fn reconcile(
        &self,
        name: &str,
        statuses: &BTreeMap<String, SubsetStatus>,
    ) -> Result<ReconcileOutcome, OrchestratorError> {
        let workload = self.status.get(name).await?;

        if self.config.validate {
            self.report_invalid_spec(&workload);
        }

        let plan = match plan(&workload.spec, statuses, &workload.current_partitions()) {
            Ok(plan) => plan,
            Err(e) => {
                self.report_infeasible(&workload, &e).await;
                return Err(e.into());
            }
        };

        self.report_allocation(name, &plan.allocation);

        let mut applied = Vec::new();
        let mut failed = Vec::new();
        for target in plan.targets() {
            match self.adapter.apply_subset(name, &target).await {
                Ok(()) => {
                    debug!(
                        subset = %target.subset,
                        replicas = target.replicas,
                        partition = target.partition,
                        phase = %target.phase,
                        "Applied subset target"
                    );
                    applied.push(target.subset);
                }
                Err(e) => {
                    warn!(subset = %target.subset, error = %e, "Failed to apply subset");
                    self.recorder.record(
                        AllocationEvent::warning(name, reasons::SUBSET_APPLY_FAILED, e.to_string())
                            .with_subset(&target.subset),
                    );
                    failed.push(target.subset);
                }
            }
        }

        let mut deleted = Vec::new();
        for subset in plan.removed() {
            match self.adapter.delete_subset(name, &subset).await {
                Ok(()) => {
                    self.recorder.record(
                        AllocationEvent::normal(
                            name,
                            reasons::SUBSET_DELETED,
                            format!("subset {subset} is no longer declared"),
                        )
                        .with_subset(&subset),
                    );
                    deleted.push(subset);
                }
                Err(e) => {
                    warn!(subset = %subset, error = %e, "Failed to delete subset");
                    self.recorder.record(
                        AllocationEvent::warning(name, reasons::SUBSET_APPLY_FAILED, e.to_string())
                            .with_subset(&subset),
                    );
                    failed.push(subset);
                }
            }
        }

        let generation = workload.generation;
        let now = Utc::now();
        let allocation = plan.allocation.clone();
        let partitions = plan.partitions.clone();
        let fully_updated = plan.fully_updated();
        let failed_count = failed.len();

        let written = update_status_with_retry(
            self.status.as_ref(),
            name,
            &self.config.status_retry,
            |status| {
                status.observed_generation = generation;
                status.replicas = i32::try_from(allocation.total()).unwrap_or(i32::MAX);
                status.subset_replicas = allocation.targets.clone();
                status.update_status = Some(UpdateStatus {
                    current_partitions: partitions.clone(),
                });

                status.set_condition(
                    ConditionType::ConstraintsFeasible,
                    ConditionStatus::True,
                    "Feasible",
                    "",
                    now,
                );

                let (degraded, reason, message) = if allocation.degraded {
                    (true, "Unschedulable", "schedulability could not be fully honored".to_string())
                } else if allocation.shortfall > 0 {
                    (
                        true,
                        "Shortfall",
                        format!("{} replicas could not be placed", allocation.shortfall),
                    )
                } else {
                    (false, "Allocated", String::new())
                };
                status.set_condition(
                    ConditionType::AllocationDegraded,
                    degraded.into(),
                    reason,
                    message,
                    now,
                );

                let (reason, message) = if failed_count == 0 {
                    ("Provisioned", String::new())
                } else {
                    ("ApplyFailed", format!("{failed_count} subsets failed to apply"))
                };
                status.set_condition(
                    ConditionType::SubsetProvisioned,
                    (failed_count == 0).into(),
                    reason,
                    message,
                    now,
                );

                let reason = if fully_updated { "Updated" } else { "Rolling" };
                status.set_condition(
                    ConditionType::SubsetUpdated,
                    fully_updated.into(),
                    reason,
                    "",
                    now,
                );
            },
        )
        .await?;

        info!(
            applied = applied.len(),
            deleted = deleted.len(),
            failed = failed.len(),
            replicas = written.status.replicas,
            "Reconciliation pass complete"
        );

        Ok(ReconcileOutcome {
            plan,
            applied,
            deleted,
            failed,
            workload: written,
        })
    }

    fn report_invalid_spec(&self, workload: &Workload) {
        let errors = validate_workload_spec(&workload.spec);
        if errors.is_empty() {
            return;
        }

        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        warn!(errors = errors.len(), %message, "Workload spec failed validation");
        self.recorder.record(AllocationEvent::warning(
            &workload.name,
            reasons::INVALID_SPEC,
            message,
        ));
    }

    fn report_allocation(&self, name: &str, allocation: &Allocation) {
        for issue in &allocation.issues {
            self.recorder.record(
                AllocationEvent::warning(name, reasons::INVALID_SUBSET_CONFIG, issue.to_string())
                    .with_subset(issue.subset()),
            );
        }

        if allocation.degraded {
            self.recorder.record(AllocationEvent::warning(
                name,
                reasons::ALLOCATION_DEGRADED,
                "schedulability could not be fully honored",
            ));
        }

        if allocation.shortfall > 0 {
            self.recorder.record(AllocationEvent::warning(
                name,
                reasons::ALLOCATION_SHORTFALL,
                format!("{} replicas could not be placed", allocation.shortfall),
            ));
        }
    }

    /// Record an infeasible allocation on the workload. Status write
    /// failures are logged; the allocation error is what the caller sees.
    async fn report_infeasible(&self, workload: &Workload, error: &AllocationError) {
        warn!(error = %error, "Subset minimums cannot be satisfied");
        self.recorder.record(AllocationEvent::warning(
            &workload.name,
            reasons::CONSTRAINTS_INFEASIBLE,
            error.to_string(),
        ));

        let generation = workload.generation;
        let now = Utc::now();
        let message = error.to_string();
        let result = update_status_with_retry(
            self.status.as_ref(),
            &workload.name,
            &self.config.status_retry,
            |status| {
                status.observed_generation = generation;
                status.set_condition(
                    ConditionType::ConstraintsFeasible,
                    ConditionStatus::False,
                    "Infeasible",
                    message.clone(),
                    now,
                );
            },
        )
        .await;

        if let Err(e) = result {
            warn!(error = %e, "Failed to record infeasible allocation");
        }
    }
}
