//! Replica allocation across subsets.
//!
//! The allocator turns a workload total plus per-subset constraints into a
//! target replica count per subset:
//!
//! - **Fixed**: declared sizes are used verbatim (clipped to their bounds);
//!   the remainder is spread round-robin, in name order, over subsets that
//!   declare no size.
//! - **Adaptive**: the Fixed result, after which any growth planned for an
//!   unschedulable subset is cancelled and re-offered to schedulable ones.
//!   Subsets with pending pods only receive quota once every idle subset is
//!   full.
//!
//! # Invariants
//!
//! - Deterministic: iteration follows explicit name-sorted index lists.
//! - `min <= target <= max` for every subset the strategy did not have to
//!   shrink for schedulability.
//! - `sum(targets) + shortfall == total` when the total is managed.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use crate::error::{AllocationError, ConfigurationError};
use crate::resolve::SubsetBounds;
use crate::types::{Allocation, SubsetStatus, WorkloadSpec};

/// Allocation state of one subset during a pass.
#[derive(Debug)]
struct Slot<'a> {
    name: &'a str,
    bounds: SubsetBounds,
    target: i64,
    current: i64,
    unschedulable: bool,
    pending_pods: i32,
}

impl Slot<'_> {
    /// Units this slot can still take before hitting its maximum.
    fn headroom(&self) -> i64 {
        match self.bounds.max {
            Some(max) => (i64::from(max) - self.target).max(0),
            None => i64::MAX,
        }
    }

    /// Units this slot can give up before dropping below its minimum.
    fn slack(&self) -> i64 {
        (self.target - i64::from(self.bounds.min)).max(0)
    }

    /// Growth planned beyond what is currently running.
    fn growth(&self) -> i64 {
        (self.target - self.current.max(0)).max(0)
    }
}

/// Direction of a round-robin pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Spread {
    Grow,
    Shrink,
}

impl Spread {
    fn room(self, slot: &Slot<'_>) -> i64 {
        match self {
            Spread::Grow => slot.headroom(),
            Spread::Shrink => slot.slack(),
        }
    }

    fn apply(self, slot: &mut Slot<'_>, units: i64) {
        match self {
            Spread::Grow => slot.target += units,
            Spread::Shrink => slot.target -= units,
        }
    }
}

/// Round-robin distributor over a fixed order of slot indices.
///
/// Hands out one unit per eligible slot per round, starting at the cursor.
/// Whole rounds are applied in bulk, so the cost does not depend on the
/// number of units moved.
#[derive(Debug)]
struct RoundRobin {
    order: Vec<usize>,
    cursor: usize,
}

impl RoundRobin {
    fn new(order: Vec<usize>) -> Self {
        Self { order, cursor: 0 }
    }

    /// Move up to `amount` units and return what could not be moved.
    fn spread(&mut self, slots: &mut [Slot<'_>], mut amount: i64, dir: Spread) -> i64 {
        while amount > 0 {
            let eligible: Vec<usize> = self
                .order
                .iter()
                .copied()
                .filter(|&i| dir.room(&slots[i]) > 0)
                .collect();
            if eligible.is_empty() {
                break;
            }

            let n = eligible.len() as i64;
            let min_room = eligible
                .iter()
                .map(|&i| dir.room(&slots[i]))
                .min()
                .unwrap_or(0);
            let rounds = (amount / n).min(min_room);
            if rounds > 0 {
                for &i in &eligible {
                    dir.apply(&mut slots[i], rounds);
                }
                amount -= rounds * n;
                continue;
            }

            // Fewer units than eligible slots: one partial round from the cursor.
            let len = self.order.len();
            let start = self.cursor;
            for step in 0..len {
                if amount == 0 {
                    break;
                }
                let pos = (start + step) % len;
                let idx = self.order[pos];
                if dir.room(&slots[idx]) > 0 {
                    dir.apply(&mut slots[idx], 1);
                    amount -= 1;
                    self.cursor = (pos + 1) % len;
                }
            }
        }
        amount
    }
}

/// Allocates a workload's replicas across its subsets.
#[derive(Debug, Clone, Copy)]
pub struct ReplicaAllocator<'a> {
    spec: &'a WorkloadSpec,
}

impl<'a> ReplicaAllocator<'a> {
    /// Create an allocator for a workload spec.
    pub fn new(spec: &'a WorkloadSpec) -> Self {
        Self { spec }
    }

    /// Compute per-subset targets from a status snapshot.
    ///
    /// Subsets missing from `statuses` are treated as empty and schedulable.
    /// Fails only when the subset minimums cannot fit in the total.
    pub fn alloc(
        &self,
        statuses: &BTreeMap<String, SubsetStatus>,
    ) -> Result<Allocation, AllocationError> {
        let total = self.spec.replicas.map(|t| t.max(0));
        let mut issues = Vec::new();
        let mut slots = self.build_slots(statuses, total, &mut issues);

        if let Some(total) = total {
            let min_sum: i64 = slots.iter().map(|s| i64::from(s.bounds.min)).sum();
            if min_sum > i64::from(total) {
                warn!(min_sum, total, "Subset minimums exceed total replicas");
                return Err(AllocationError::Infeasible { min_sum, total });
            }
        }

        let mut shortfall = fixed_pass(&mut slots, total.map(i64::from));
        let mut degraded = false;

        if self.spec.is_adaptive() {
            let (unplaced, was_degraded) = redistribute(&mut slots);
            shortfall += unplaced;
            degraded = was_degraded;
        }

        let targets: BTreeMap<String, i32> = slots
            .iter()
            .map(|s| (s.name.to_string(), clamp_i32(s.target)))
            .collect();

        debug!(
            strategy = %self.spec.schedule_strategy,
            total = ?total,
            shortfall,
            degraded,
            targets = ?targets,
            "Computed subset allocation"
        );

        Ok(Allocation {
            targets,
            shortfall: clamp_i32(shortfall),
            degraded,
            issues,
        })
    }

    /// Resolve each subset once, dropping duplicate names.
    fn build_slots(
        &self,
        statuses: &BTreeMap<String, SubsetStatus>,
        total: Option<i32>,
        issues: &mut Vec<ConfigurationError>,
    ) -> Vec<Slot<'a>> {
        let spec: &'a WorkloadSpec = self.spec;
        let mut seen = HashSet::new();
        let mut slots = Vec::with_capacity(spec.subsets.len());

        for subset in &spec.subsets {
            if !seen.insert(subset.name.as_str()) {
                warn!(subset = %subset.name, "Dropping duplicate subset");
                issues.push(ConfigurationError::DuplicateSubset(subset.name.clone()));
                continue;
            }

            let (bounds, subset_issues) = SubsetBounds::resolve(subset, total);
            issues.extend(subset_issues);

            let status = statuses.get(&subset.name).copied().unwrap_or_default();
            slots.push(Slot {
                name: subset.name.as_str(),
                bounds,
                target: 0,
                current: i64::from(status.replicas),
                unschedulable: !status.is_schedulable(),
                pending_pods: status.unschedulable.pending_pods,
            });
        }

        slots
    }
}

/// Indices of slots matching `pred`, sorted by subset name.
fn name_order(slots: &[Slot<'_>], pred: impl Fn(&Slot<'_>) -> bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..slots.len()).filter(|&i| pred(&slots[i])).collect();
    order.sort_by(|&a, &b| slots[a].name.cmp(slots[b].name));
    order
}

/// Honor declared sizes, then spread the remainder over undeclared subsets.
///
/// Returns the part of the total that could not be placed.
fn fixed_pass(slots: &mut [Slot<'_>], total: Option<i64>) -> i64 {
    for slot in slots.iter_mut() {
        slot.target = match slot.bounds.replicas {
            Some(replicas) => i64::from(slot.bounds.clamp(replicas)),
            None => i64::from(slot.bounds.min),
        };
    }

    let Some(total) = total else {
        return 0;
    };

    let claimed: i64 = slots.iter().map(|s| s.target).sum();
    let remainder = total - claimed;

    if remainder > 0 {
        let order = name_order(slots, |s| !s.bounds.is_declared());
        let unplaced = RoundRobin::new(order).spread(slots, remainder, Spread::Grow);
        if unplaced > 0 {
            debug!(unplaced, "Undeclared subsets are full, leaving remainder unplaced");
        }
        unplaced
    } else if remainder < 0 {
        // Declared sizes over-claim the total: give back from the last names first.
        let mut order = name_order(slots, |s| s.bounds.is_declared());
        order.reverse();
        let excess = -remainder;
        let left = RoundRobin::new(order).spread(slots, excess, Spread::Shrink);
        debug!(excess, left, "Trimmed declared subsets to fit total");
        0
    } else {
        0
    }
}

/// Cancel growth in unschedulable subsets and re-offer it elsewhere.
///
/// Returns the units that could not be moved and whether the pass is
/// degraded.
fn redistribute(slots: &mut [Slot<'_>]) -> (i64, bool) {
    if slots.is_empty() {
        return (0, false);
    }
    if slots.iter().all(|s| s.unschedulable) {
        warn!("Every subset is unschedulable, keeping fixed allocation");
        return (0, true);
    }

    let mut idle = RoundRobin::new(name_order(slots, |s| {
        !s.unschedulable && s.pending_pods <= 0
    }));
    let mut busy = RoundRobin::new(name_order(slots, |s| {
        !s.unschedulable && s.pending_pods > 0
    }));

    let mut unplaced = 0;
    for _ in 0..slots.len() {
        let mut freed = 0;
        for slot in slots.iter_mut().filter(|s| s.unschedulable) {
            let growth = slot.growth();
            if growth > 0 {
                debug!(
                    subset = slot.name,
                    growth,
                    current = slot.current,
                    "Cancelling growth in unschedulable subset"
                );
                slot.target -= growth;
                freed += growth;
            }
        }
        if freed == 0 {
            break;
        }

        let left = idle.spread(slots, freed, Spread::Grow);
        let left = busy.spread(slots, left, Spread::Grow);
        unplaced += left;
        if left == freed {
            break;
        }
    }

    if unplaced > 0 {
        warn!(unplaced, "No schedulable capacity for cancelled growth");
    }
    (unplaced, unplaced > 0)
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
