//! Events emitted while reconciling a workload.
//!
//! Events are informational: they describe degraded or misconfigured
//! passes to operators, and never change the outcome of a pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Event reasons as constants.
pub mod reasons {
    pub const ALLOCATION_DEGRADED: &str = "AllocationDegraded";
    pub const ALLOCATION_SHORTFALL: &str = "AllocationShortfall";
    pub const CONSTRAINTS_INFEASIBLE: &str = "ConstraintsInfeasible";
    pub const INVALID_SUBSET_CONFIG: &str = "InvalidSubsetConfig";
    pub const INVALID_SPEC: &str = "InvalidSpec";
    pub const SUBSET_APPLY_FAILED: &str = "SubsetApplyFailed";
    pub const SUBSET_DELETED: &str = "SubsetDeleted";
}

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    #[default]
    Normal,
    Warning,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSeverity::Normal => write!(f, "normal"),
            EventSeverity::Warning => write!(f, "warning"),
        }
    }
}

/// One event about a workload, optionally scoped to a subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationEvent {
    pub occurred_at: DateTime<Utc>,

    pub workload: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subset: Option<String>,

    pub severity: EventSeverity,

    /// One of [`reasons`].
    pub reason: String,

    pub message: String,
}

impl AllocationEvent {
    pub fn normal(workload: &str, reason: &str, message: impl Into<String>) -> Self {
        Self::new(workload, EventSeverity::Normal, reason, message)
    }

    pub fn warning(workload: &str, reason: &str, message: impl Into<String>) -> Self {
        Self::new(workload, EventSeverity::Warning, reason, message)
    }

    fn new(
        workload: &str,
        severity: EventSeverity,
        reason: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            occurred_at: Utc::now(),
            workload: workload.to_string(),
            subset: None,
            severity,
            reason: reason.to_string(),
            message: message.into(),
        }
    }

    pub fn with_subset(mut self, subset: impl Into<String>) -> Self {
        self.subset = Some(subset.into());
        self
    }
}

/// Sink for allocation events.
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: AllocationEvent);
}

/// Recorder that only writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRecorder;

impl EventRecorder for LogRecorder {
    fn record(&self, event: AllocationEvent) {
        let subset = event.subset.as_deref().unwrap_or("");
        match event.severity {
            EventSeverity::Normal => info!(
                workload = %event.workload,
                subset,
                reason = %event.reason,
                "{}",
                event.message
            ),
            EventSeverity::Warning => warn!(
                workload = %event.workload,
                subset,
                reason = %event.reason,
                "{}",
                event.message
            ),
        }
    }
}
