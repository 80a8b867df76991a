//! Error types for constraint resolution and replica allocation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when resolving an int-or-percentage value.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveError {
    /// The string value does not end with `%`.
    #[error("percentage {0:?} is missing the '%' suffix")]
    MissingPercentSuffix(String),

    /// The numeric part of the percentage is not a base-10 integer.
    #[error("percentage {value:?} is not an integer: {reason}")]
    InvalidPercent { value: String, reason: String },
}

/// Which replica field of a subset a problem refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplicaField {
    Replicas,
    MinReplicas,
    MaxReplicas,
}

impl std::fmt::Display for ReplicaField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReplicaField::Replicas => "replicas",
            ReplicaField::MinReplicas => "minReplicas",
            ReplicaField::MaxReplicas => "maxReplicas",
        };
        write!(f, "{}", s)
    }
}

/// A configuration problem the allocator worked around.
///
/// These never abort an allocation; the offending constraint or subset is
/// left out and the rest of the workload is allocated best-effort.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationError {
    /// A replica field could not be resolved; the constraint was ignored.
    #[error("subset {subset}: ignoring {field}: {source}")]
    Unresolvable {
        subset: String,
        field: ReplicaField,
        #[source]
        source: ResolveError,
    },

    /// A subset name appeared more than once; later entries were dropped.
    #[error("duplicate subset name: {0}")]
    DuplicateSubset(String),
}

impl ConfigurationError {
    /// The subset this problem refers to.
    pub fn subset(&self) -> &str {
        match self {
            ConfigurationError::Unresolvable { subset, .. } => subset,
            ConfigurationError::DuplicateSubset(subset) => subset,
        }
    }
}

/// Errors that prevent an allocation from being produced at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// The subset minimums cannot all be honored within the total.
    #[error("sum of subset minimums ({min_sum}) exceeds total replicas ({total})")]
    Infeasible { min_sum: i64, total: i32 },
}

impl AllocationError {
    /// Returns true if the spec must change before allocation can succeed.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, AllocationError::Infeasible { .. })
    }
}
