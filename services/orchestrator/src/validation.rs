//! Admission-style validation of a workload spec.
//!
//! The allocator tolerates everything rejected here, so the orchestrator
//! only reports these findings; an admission layer may refuse the spec
//! outright.

use std::collections::HashSet;

use fleetset_allocation::resolve::parse_percent;
use fleetset_allocation::{resolve, IntOrPercent, SubsetSpec, WorkloadSpec};
use thiserror::Error;

/// Maximum length of a subset name (DNS-1123 label).
pub const MAX_SUBSET_NAME_LENGTH: usize = 63;

/// Category of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldErrorKind {
    Required,
    Invalid,
    Duplicate,
}

/// A single rejected field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{path}: {detail}")]
pub struct FieldError {
    /// Path of the field, e.g. `spec.subsets[1].name`.
    pub path: String,
    pub kind: FieldErrorKind,
    pub detail: String,
}

impl FieldError {
    fn required(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::Required,
            detail: detail.into(),
        }
    }

    fn invalid(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::Invalid,
            detail: detail.into(),
        }
    }

    fn duplicate(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::Duplicate,
            detail: detail.into(),
        }
    }
}

/// Validate a workload spec, returning every problem found.
pub fn validate_workload_spec(spec: &WorkloadSpec) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if let Some(replicas) = spec.replicas {
        if replicas < 0 {
            errors.push(FieldError::invalid(
                "spec.replicas",
                "must be greater than or equal to 0",
            ));
        }
    }

    if spec.subsets.is_empty() {
        errors.push(FieldError::required(
            "spec.subsets",
            "at least one subset is required",
        ));
    }

    let mut names = HashSet::new();
    for (i, subset) in spec.subsets.iter().enumerate() {
        let path = format!("spec.subsets[{i}]");
        validate_subset_name(&subset.name, &path, &mut errors);
        if !subset.name.is_empty() && !names.insert(subset.name.as_str()) {
            errors.push(FieldError::duplicate(
                format!("{path}.name"),
                format!("subset name {:?} is already used", subset.name),
            ));
        }
        validate_subset_replicas(subset, spec.replicas, &path, &mut errors);
    }

    validate_declared_sum(spec, &mut errors);
    validate_manual_partitions(spec, &names, &mut errors);

    errors
}

fn validate_subset_name(name: &str, path: &str, errors: &mut Vec<FieldError>) {
    let path = format!("{path}.name");
    if name.is_empty() {
        errors.push(FieldError::required(path, "subset name cannot be empty"));
        return;
    }

    if name.len() > MAX_SUBSET_NAME_LENGTH {
        errors.push(FieldError::invalid(
            path,
            format!("must be no more than {MAX_SUBSET_NAME_LENGTH} characters"),
        ));
        return;
    }

    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_edges = !name.starts_with('-') && !name.ends_with('-');
    if !valid_chars || !valid_edges {
        errors.push(FieldError::invalid(
            path,
            "must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character",
        ));
    }
}

fn validate_int_or_percent(value: &IntOrPercent, path: &str, errors: &mut Vec<FieldError>) -> bool {
    match value {
        IntOrPercent::Absolute(n) if *n < 0 => {
            errors.push(FieldError::invalid(path, "must be greater than or equal to 0"));
            false
        }
        IntOrPercent::Absolute(_) => true,
        IntOrPercent::Percent(raw) => match parse_percent(raw) {
            Ok(p) if (0..=100).contains(&p) => true,
            Ok(_) => {
                errors.push(FieldError::invalid(
                    path,
                    format!("percentage {raw:?} must be in range [0%, 100%]"),
                ));
                false
            }
            Err(e) => {
                errors.push(FieldError::invalid(path, e.to_string()));
                false
            }
        },
    }
}

fn validate_subset_replicas(
    subset: &SubsetSpec,
    total: Option<i32>,
    path: &str,
    errors: &mut Vec<FieldError>,
) {
    if let Some(replicas) = &subset.replicas {
        validate_int_or_percent(replicas, &format!("{path}.replicas"), errors);
    }

    let min_ok = subset
        .min_replicas
        .as_ref()
        .map(|v| validate_int_or_percent(v, &format!("{path}.minReplicas"), errors));
    let max_ok = subset
        .max_replicas
        .as_ref()
        .map(|v| validate_int_or_percent(v, &format!("{path}.maxReplicas"), errors));

    if let (Some(true), Some(true), Some(min), Some(max)) = (
        min_ok,
        max_ok,
        subset.min_replicas.as_ref(),
        subset.max_replicas.as_ref(),
    ) {
        let min = resolve(min, total);
        let max = resolve(max, total);
        if let (Ok(min), Ok(max)) = (min, max) {
            if !min.total_unknown && !max.total_unknown && min.value > max.value {
                errors.push(FieldError::invalid(
                    format!("{path}.maxReplicas"),
                    format!(
                        "maxReplicas ({}) must not be less than minReplicas ({})",
                        max.value, min.value
                    ),
                ));
            }
        }
    }
}

/// When every subset declares its size, the sizes must add up to the total.
fn validate_declared_sum(spec: &WorkloadSpec, errors: &mut Vec<FieldError>) {
    let Some(total) = spec.replicas else {
        return;
    };
    if spec.subsets.is_empty() {
        return;
    }

    let mut declared_sum: i64 = 0;
    let mut all_declared = true;
    for subset in &spec.subsets {
        match subset.replicas.as_ref().map(|r| resolve(r, Some(total))) {
            Some(Ok(r)) => declared_sum += i64::from(r.value.max(0)),
            Some(Err(_)) => return,
            None => all_declared = false,
        }
    }

    if declared_sum > i64::from(total) {
        errors.push(FieldError::invalid(
            "spec.subsets",
            format!("sum of subset replicas ({declared_sum}) exceeds spec.replicas ({total})"),
        ));
    } else if all_declared && declared_sum < i64::from(total) {
        errors.push(FieldError::invalid(
            "spec.subsets",
            format!(
                "sum of subset replicas ({declared_sum}) must equal spec.replicas ({total}) when every subset declares replicas"
            ),
        ));
    }
}

fn validate_manual_partitions(
    spec: &WorkloadSpec,
    names: &HashSet<&str>,
    errors: &mut Vec<FieldError>,
) {
    let Some(partitions) = spec.update_strategy.manual_partitions() else {
        return;
    };

    for (subset, partition) in partitions {
        let path = format!("spec.updateStrategy.manualUpdate.partitions[{subset}]");
        if !names.contains(subset.as_str()) {
            errors.push(FieldError::invalid(
                path.clone(),
                format!("subset {subset:?} is not declared"),
            ));
        }
        if *partition < 0 {
            errors.push(FieldError::invalid(path, "must be greater than or equal to 0"));
        }
    }
}
