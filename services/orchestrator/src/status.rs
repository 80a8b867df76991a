//! Status write-back with optimistic-concurrency retry.
//!
//! The helper fetches the latest object, applies a mutation to its status
//! only, and writes it back. On a version conflict it fetches again and
//! reapplies the mutation, up to a bounded number of retries.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::workload::{Workload, WorkloadStatus};

/// Errors returned by the status collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatusError {
    /// The object changed between fetch and update.
    #[error("conflict: {0} was modified concurrently")]
    Conflict(String),

    /// The object does not exist.
    #[error("workload not found: {0}")]
    NotFound(String),

    /// Every attempt hit a conflict.
    #[error("status update for {name} still conflicting after {attempts} attempts")]
    RetriesExhausted { name: String, attempts: u32 },

    /// Any other backend failure. Not retried.
    #[error("status backend error: {0}")]
    Backend(String),
}

impl StatusError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StatusError::Conflict(_))
    }
}

/// Store holding workload objects.
///
/// `update_status` has status-subresource semantics: it writes only the
/// status of the given object, and fails with [`StatusError::Conflict`]
/// when `resource_version` is stale.
#[async_trait]
pub trait StatusClient: Send + Sync {
    async fn get(&self, name: &str) -> Result<Workload, StatusError>;

    async fn update_status(&self, workload: &Workload) -> Result<Workload, StatusError>;
}

/// Retry bound for conflicting status writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Pause before each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_STATUS_MAX_RETRIES,
            backoff: DEFAULT_STATUS_RETRY_BACKOFF,
        }
    }
}

/// Default retry limit for status writes.
pub const DEFAULT_STATUS_MAX_RETRIES: u32 = 5;

/// Default pause between conflicting status writes.
pub const DEFAULT_STATUS_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Apply `mutate` to the latest status of `name` and write it back.
///
/// The spec of the returned object is whatever the store holds; this
/// helper never sends a modified spec. Writes that would not change the
/// status are skipped.
pub async fn update_status_with_retry<F>(
    client: &dyn StatusClient,
    name: &str,
    policy: &RetryPolicy,
    mut mutate: F,
) -> Result<Workload, StatusError>
where
    F: FnMut(&mut WorkloadStatus) + Send,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let latest = client.get(name).await?;

        let mut updated = latest.clone();
        mutate(&mut updated.status);
        if updated.status == latest.status {
            debug!(workload = %name, "Status unchanged, skipping write");
            return Ok(latest);
        }

        match client.update_status(&updated).await {
            Ok(written) => {
                debug!(workload = %name, attempt, "Status updated");
                return Ok(written);
            }
            Err(e) if e.is_conflict() => {
                if attempt > policy.max_retries {
                    warn!(workload = %name, attempts = attempt, "Giving up on conflicting status update");
                    return Err(StatusError::RetriesExhausted {
                        name: name.to_string(),
                        attempts: attempt,
                    });
                }
                debug!(workload = %name, attempt, "Status update conflicted, retrying");
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}
