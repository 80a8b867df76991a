//! Allocation orchestrator for multi-subset workloads.
//!
//! Wraps the pure engine in `fleetset-allocation` with the collaborators a
//! controller needs for one reconciliation pass:
//!
//! - [`StatusClient`]: fetches workloads and writes their status, retried
//!   on optimistic-concurrency conflicts by [`update_status_with_retry`]
//! - [`SubsetAdapter`]: materializes each subset's replicas and partition
//! - [`EventRecorder`]: receives degraded and misconfiguration events
//!
//! The event loop that decides when to run a pass is not part of this
//! crate.

pub mod adapter;
pub mod config;
pub mod events;
pub mod orchestrator;
pub mod status;
pub mod telemetry;
pub mod validation;
pub mod workload;

pub use adapter::{AdapterError, SubsetAdapter, SubsetTarget};
pub use config::Config;
pub use events::{reasons, AllocationEvent, EventRecorder, EventSeverity, LogRecorder};
pub use orchestrator::{plan, Orchestrator, OrchestratorError, ReconcileOutcome, ReconcilePlan};
pub use status::{update_status_with_retry, RetryPolicy, StatusClient, StatusError};
pub use validation::{validate_workload_spec, FieldError, FieldErrorKind};
pub use workload::{
    ConditionStatus, ConditionType, UpdateStatus, Workload, WorkloadCondition, WorkloadStatus,
};
