use std::time::Duration;

use anyhow::{Context, Result};

use crate::status::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub status_retry: RetryPolicy,
    /// Run the spec validator on every pass and report its findings.
    pub validate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            status_retry: RetryPolicy::default(),
            validate: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let log_level = lookup("FLEETSET_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let max_retries = match lookup("FLEETSET_STATUS_MAX_RETRIES") {
            Some(v) => v
                .parse::<u32>()
                .with_context(|| format!("invalid FLEETSET_STATUS_MAX_RETRIES: {v:?}"))?,
            None => RetryPolicy::default().max_retries,
        };

        let backoff = match lookup("FLEETSET_STATUS_RETRY_BACKOFF_MS") {
            Some(v) => Duration::from_millis(
                v.parse::<u64>()
                    .with_context(|| format!("invalid FLEETSET_STATUS_RETRY_BACKOFF_MS: {v:?}"))?,
            ),
            None => RetryPolicy::default().backoff,
        };

        let validate = lookup("FLEETSET_VALIDATE")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(true);

        Ok(Self {
            log_level,
            status_retry: RetryPolicy {
                max_retries,
                backoff,
            },
            validate,
        })
    }
}
