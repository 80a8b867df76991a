//! Replica allocation and rollout partitions for multi-subset workloads.
//!
//! A workload declares a total replica count and a list of subsets (e.g.
//! one per zone or node pool). This library decides:
//!
//! - **How many replicas each subset gets** ([`ReplicaAllocator`]), from
//!   fixed sizes, percentages and min/max bounds, optionally steering growth
//!   away from subsets that cannot schedule new instances.
//! - **How far each subset's rolling update may progress**
//!   ([`calc_next_partitions`], [`next_update`]).
//!
//! # Invariants
//!
//! - Pure and synchronous: inputs are snapshots, outputs are new values.
//! - Deterministic: the same inputs always produce the same outputs, and
//!   no decision depends on hash map iteration order.
//! - Malformed input degrades locally; only infeasible minimums fail.

pub mod allocator;
pub mod error;
pub mod partition;
pub mod resolve;
pub mod types;

pub use allocator::ReplicaAllocator;
pub use error::{AllocationError, ConfigurationError, ReplicaField, ResolveError};
pub use partition::{
    calc_next_partitions, next_update, rollout_phases, RolloutPhase, SubsetSnapshot,
};
pub use resolve::{resolve, Resolved, SubsetBounds};
pub use types::{
    Allocation, IntOrPercent, ManualUpdate, Partitions, ScheduleStrategyType, SubsetSpec,
    SubsetStatus, UnschedulableStatus, UpdateStrategy, WorkloadSpec,
};
