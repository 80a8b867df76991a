//! Data model shared by the resolver, allocator and partition calculator.
//!
//! Everything here is a plain snapshot value: built fresh for each
//! reconciliation pass and never mutated by the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

// =============================================================================
// Declarative spec
// =============================================================================

/// A replica field that is either an absolute count or a percentage of the
/// workload total, e.g. `3` or `"30%"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrPercent {
    /// Absolute replica count.
    Absolute(i32),
    /// Percentage string with a trailing `%`.
    Percent(String),
}

impl From<i32> for IntOrPercent {
    fn from(value: i32) -> Self {
        IntOrPercent::Absolute(value)
    }
}

impl From<&str> for IntOrPercent {
    fn from(value: &str) -> Self {
        IntOrPercent::Percent(value.to_string())
    }
}

impl std::fmt::Display for IntOrPercent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntOrPercent::Absolute(n) => write!(f, "{}", n),
            IntOrPercent::Percent(s) => write!(f, "{}", s),
        }
    }
}

/// How the allocator reacts to subsets that cannot accept new instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ScheduleStrategyType {
    /// Honor declared sizing regardless of schedulability.
    #[default]
    Fixed,
    /// Move pending growth away from unschedulable subsets.
    Adaptive,
}

impl std::fmt::Display for ScheduleStrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleStrategyType::Fixed => write!(f, "Fixed"),
            ScheduleStrategyType::Adaptive => write!(f, "Adaptive"),
        }
    }
}

/// One named subset of the workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetSpec {
    /// Unique, stable identity within the workload.
    pub name: String,

    /// Fixed size for this subset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<IntOrPercent>,

    /// Lower bound, 0 when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<IntOrPercent>,

    /// Upper bound, unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<IntOrPercent>,
}

impl SubsetSpec {
    /// Create an unconstrained subset.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replicas: None,
            min_replicas: None,
            max_replicas: None,
        }
    }

    pub fn with_replicas(mut self, replicas: impl Into<IntOrPercent>) -> Self {
        self.replicas = Some(replicas.into());
        self
    }

    pub fn with_min(mut self, min: impl Into<IntOrPercent>) -> Self {
        self.min_replicas = Some(min.into());
        self
    }

    pub fn with_max(mut self, max: impl Into<IntOrPercent>) -> Self {
        self.max_replicas = Some(max.into());
        self
    }
}

/// Explicit per-subset partitions chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ManualUpdate {
    #[serde(default)]
    pub partitions: BTreeMap<String, i32>,
}

/// Rolling update settings. No manual update means fully rolled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UpdateStrategy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_update: Option<ManualUpdate>,
}

impl UpdateStrategy {
    /// Manual partition overrides, if any were declared.
    pub fn manual_partitions(&self) -> Option<&BTreeMap<String, i32>> {
        self.manual_update.as_ref().map(|m| &m.partitions)
    }
}

/// The declarative workload definition, fully decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkloadSpec {
    /// Total replicas. `None` leaves the total unmanaged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Ordered subset definitions.
    #[serde(default)]
    pub subsets: Vec<SubsetSpec>,

    #[serde(default)]
    pub update_strategy: UpdateStrategy,

    #[serde(default)]
    pub schedule_strategy: ScheduleStrategyType,
}

impl WorkloadSpec {
    /// Create a spec with a managed total and the default (Fixed) strategy.
    pub fn new(replicas: Option<i32>, subsets: Vec<SubsetSpec>) -> Self {
        Self {
            replicas,
            subsets,
            ..Default::default()
        }
    }

    pub fn with_strategy(mut self, strategy: ScheduleStrategyType) -> Self {
        self.schedule_strategy = strategy;
        self
    }

    pub fn with_manual_partitions(mut self, partitions: BTreeMap<String, i32>) -> Self {
        self.update_strategy.manual_update = Some(ManualUpdate { partitions });
        self
    }

    /// Subset names in declaration order.
    pub fn subset_names(&self) -> impl Iterator<Item = &str> {
        self.subsets.iter().map(|s| s.name.as_str())
    }

    pub fn is_adaptive(&self) -> bool {
        self.schedule_strategy == ScheduleStrategyType::Adaptive
    }
}

// =============================================================================
// Live status
// =============================================================================

/// Schedulability signal reported for a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UnschedulableStatus {
    /// The subset cannot currently accept new instances.
    pub unschedulable: bool,

    /// Instances assigned to the subset but not yet running.
    pub pending_pods: i32,
}

/// Observed state of one subset's sub-workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SubsetStatus {
    /// Replicas currently bound to the subset.
    pub replicas: i32,

    #[serde(default)]
    pub unschedulable: UnschedulableStatus,

    /// Partition currently applied to the sub-workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,
}

impl SubsetStatus {
    /// A healthy subset running `replicas` instances.
    pub fn running(replicas: i32) -> Self {
        Self {
            replicas,
            ..Default::default()
        }
    }

    pub fn unschedulable(mut self) -> Self {
        self.unschedulable.unschedulable = true;
        self
    }

    pub fn with_pending(mut self, pending_pods: i32) -> Self {
        self.unschedulable.pending_pods = pending_pods;
        self
    }

    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn is_schedulable(&self) -> bool {
        !self.unschedulable.unschedulable
    }
}

// =============================================================================
// Results
// =============================================================================

/// Per-subset replica targets produced by the allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Allocation {
    /// Target replicas keyed by subset name.
    pub targets: BTreeMap<String, i32>,

    /// Units of the declared total that could not be placed this pass.
    pub shortfall: i32,

    /// Schedulability could not be fully honored this pass.
    pub degraded: bool,

    /// Configuration problems that were worked around.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ConfigurationError>,
}

impl Allocation {
    /// Sum of all targets.
    pub fn total(&self) -> i64 {
        self.targets.values().map(|&v| i64::from(v)).sum()
    }

    pub fn get(&self, subset: &str) -> Option<i32> {
        self.targets.get(subset).copied()
    }

    /// True when the whole total was placed and schedulability was honored.
    pub fn is_satisfied(&self) -> bool {
        self.shortfall == 0 && !self.degraded
    }
}

/// Per-subset rolling-update partitions keyed by subset name.
pub type Partitions = BTreeMap<String, i32>;
