//! Rolling-update partitions per subset.
//!
//! A partition is the number of highest-ordinal replicas of a subset that
//! stay on the old revision. Replicas with index `< replicas - partition`
//! may move to the new revision.
//!
//! Nothing here is persisted: the rollout phase of each subset is derived
//! again on every pass from the previous and next snapshots, so the
//! calculation is idempotent and safe to repeat after a crash.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{Partitions, SubsetStatus, WorkloadSpec};

/// What a subset looked like before this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SubsetSnapshot {
    /// Replica count before this pass.
    pub replicas: i32,

    /// Partition before this pass. `None` means every replica is pinned.
    ///
    /// The calculator never lowers a partition on its own: it only keeps
    /// pre-existing replicas pinned while a subset resizes. Rollout
    /// progress comes from the adapter reporting a lower partition here
    /// (or from a manual override); once it reports 0, later passes keep
    /// the subset at 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,
}

impl SubsetSnapshot {
    pub fn new(replicas: i32, partition: Option<i32>) -> Self {
        Self {
            replicas,
            partition,
        }
    }

    /// Previous partition, defaulting to "all pinned".
    pub fn previous_partition(&self) -> i32 {
        self.partition.unwrap_or(self.replicas).max(0)
    }
}

impl From<&SubsetStatus> for SubsetSnapshot {
    fn from(status: &SubsetStatus) -> Self {
        Self {
            replicas: status.replicas,
            partition: status.partition,
        }
    }
}

/// Rollout phase of a subset between two passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutPhase {
    Growing,
    Steady,
    Shrinking,
    Removed,
}

impl RolloutPhase {
    /// Derive the phase from the sign of the replica delta.
    ///
    /// A missing `next` means the subset is no longer desired.
    pub fn between(previous: Option<i32>, next: Option<i32>) -> Self {
        let Some(next) = next else {
            return RolloutPhase::Removed;
        };
        let previous = previous.unwrap_or(0).max(0);
        match next.max(0).cmp(&previous) {
            std::cmp::Ordering::Greater => RolloutPhase::Growing,
            std::cmp::Ordering::Equal => RolloutPhase::Steady,
            std::cmp::Ordering::Less => RolloutPhase::Shrinking,
        }
    }
}

impl std::fmt::Display for RolloutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RolloutPhase::Growing => "growing",
            RolloutPhase::Steady => "steady",
            RolloutPhase::Shrinking => "shrinking",
            RolloutPhase::Removed => "removed",
        };
        write!(f, "{}", s)
    }
}

/// Compute the next partition for every desired subset.
///
/// - Growing: the previous replica count, so growth lands on the new
///   revision; capped by the previous partition so replicas that already
///   moved never go back.
/// - Steady or shrinking: `min(previous partition, new replicas)`.
/// - No previous snapshot: 0.
pub fn calc_next_partitions(
    current: &BTreeMap<String, SubsetSnapshot>,
    desired: &BTreeMap<String, i32>,
) -> Partitions {
    desired
        .iter()
        .map(|(name, &replicas)| (name.clone(), next_partition(current.get(name), replicas)))
        .collect()
}

fn next_partition(previous: Option<&SubsetSnapshot>, desired: i32) -> i32 {
    let desired = desired.max(0);
    let Some(previous) = previous else {
        return 0;
    };

    let pinned = previous.previous_partition();
    let partition = match RolloutPhase::between(Some(previous.replicas), Some(desired)) {
        RolloutPhase::Growing => previous.replicas.max(0).min(pinned),
        _ => pinned.min(desired),
    };
    partition.clamp(0, desired)
}

/// Merge manual partition overrides on top of the computed partitions.
///
/// An empty override map places no hold on any subset: the result is
/// exactly the computed partitions, which only pin replicas the adapter
/// has not yet reported as updated.
///
/// An override wins for its subset (clipped to the desired replicas).
/// Subsets listed in the spec but absent from `desired` get 0. Override
/// keys naming unknown subsets are ignored.
pub fn next_update(
    spec: &WorkloadSpec,
    current: &BTreeMap<String, SubsetSnapshot>,
    desired: &BTreeMap<String, i32>,
) -> Partitions {
    let computed = calc_next_partitions(current, desired);
    let overrides = spec.update_strategy.manual_partitions();

    let names: BTreeSet<&str> = spec
        .subset_names()
        .chain(desired.keys().map(String::as_str))
        .collect();

    names
        .into_iter()
        .map(|name| {
            let partition = match desired.get(name) {
                None => 0,
                Some(&replicas) => match overrides.and_then(|o| o.get(name)) {
                    Some(&manual) => manual.clamp(0, replicas.max(0)),
                    None => computed.get(name).copied().unwrap_or(0),
                },
            };
            (name.to_string(), partition)
        })
        .collect()
}

/// Rollout phase of every subset known to either snapshot.
pub fn rollout_phases(
    current: &BTreeMap<String, SubsetSnapshot>,
    desired: &BTreeMap<String, i32>,
) -> BTreeMap<String, RolloutPhase> {
    let names: BTreeSet<&String> = current.keys().chain(desired.keys()).collect();
    names
        .into_iter()
        .map(|name| {
            let phase = RolloutPhase::between(
                current.get(name).map(|s| s.replicas),
                desired.get(name).copied(),
            );
            (name.clone(), phase)
        })
        .collect()
}
