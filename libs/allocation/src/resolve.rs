//! Constraint resolution.
//!
//! Turns a subset's declared replica fields, each either an absolute count
//! or a percentage of the workload total, into absolute integers.

use tracing::warn;

use crate::error::{ConfigurationError, ReplicaField, ResolveError};
use crate::types::{IntOrPercent, SubsetSpec};

/// A resolved replica value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// Absolute value.
    pub value: i32,

    /// The value was a percentage of an unmanaged total. Callers should
    /// treat the constraint as absent rather than as zero.
    pub total_unknown: bool,
}

impl Resolved {
    fn known(value: i32) -> Self {
        Self {
            value,
            total_unknown: false,
        }
    }
}

/// Resolve an int-or-percentage value against the workload total.
///
/// Percentages round half away from zero: `35%` of 10 is 4, `33%` of 10 is 3.
pub fn resolve(value: &IntOrPercent, total: Option<i32>) -> Result<Resolved, ResolveError> {
    match value {
        IntOrPercent::Absolute(n) => Ok(Resolved::known(*n)),
        IntOrPercent::Percent(raw) => {
            let percent = parse_percent(raw)?;
            match total {
                Some(total) => Ok(Resolved::known(scale(total, percent))),
                None => Ok(Resolved {
                    value: 0,
                    total_unknown: true,
                }),
            }
        }
    }
}

/// Parse `"<int>%"` into its integer part. Values above 100 are accepted.
pub fn parse_percent(raw: &str) -> Result<i32, ResolveError> {
    let Some(body) = raw.strip_suffix('%') else {
        return Err(ResolveError::MissingPercentSuffix(raw.to_string()));
    };

    body.parse::<i32>()
        .map_err(|e| ResolveError::InvalidPercent {
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn scale(total: i32, percent: i32) -> i32 {
    let exact = f64::from(total) * f64::from(percent) / 100.0;
    // f64 -> i32 casts saturate.
    exact.round() as i32
}

/// Absolute bounds of one subset for a given total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsetBounds {
    /// Declared size, if any.
    pub replicas: Option<i32>,

    /// Lower bound, never negative.
    pub min: i32,

    /// Upper bound, never below `min`. `None` is unbounded.
    pub max: Option<i32>,
}

impl Default for SubsetBounds {
    fn default() -> Self {
        Self {
            replicas: None,
            min: 0,
            max: None,
        }
    }
}

impl SubsetBounds {
    /// Resolve all replica fields of a subset.
    ///
    /// Fields that fail to resolve are dropped and reported; negative values
    /// clamp to zero; a minimum above the maximum raises the maximum.
    pub fn resolve(spec: &SubsetSpec, total: Option<i32>) -> (Self, Vec<ConfigurationError>) {
        let mut issues = Vec::new();
        let mut field = |value: Option<&IntOrPercent>, which: ReplicaField| -> Option<Resolved> {
            let value = value?;
            match resolve(value, total) {
                Ok(r) => Some(r),
                Err(source) => {
                    warn!(
                        subset = %spec.name,
                        field = %which,
                        value = %value,
                        error = %source,
                        "Ignoring unresolvable replica constraint"
                    );
                    issues.push(ConfigurationError::Unresolvable {
                        subset: spec.name.clone(),
                        field: which,
                        source,
                    });
                    None
                }
            }
        };

        let replicas = field(spec.replicas.as_ref(), ReplicaField::Replicas);
        let min = field(spec.min_replicas.as_ref(), ReplicaField::MinReplicas);
        let max = field(spec.max_replicas.as_ref(), ReplicaField::MaxReplicas);

        let known = |r: Option<Resolved>| r.filter(|r| !r.total_unknown).map(|r| r.value.max(0));

        let min = known(min).unwrap_or(0);
        let max = known(max).map(|m| m.max(min));

        let bounds = Self {
            replicas: known(replicas),
            min,
            max,
        };
        (bounds, issues)
    }

    /// Clip a value into `[min, max]`.
    pub fn clamp(&self, value: i32) -> i32 {
        let value = value.max(self.min);
        match self.max {
            Some(max) => value.min(max),
            None => value,
        }
    }

    /// True when the subset declares a fixed size.
    pub fn is_declared(&self) -> bool {
        self.replicas.is_some()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("50%", 10, 5)]
    #[case("33%", 10, 3)]
    #[case("35%", 10, 4)]
    #[case("34%", 10, 3)]
    #[case("0%", 10, 0)]
    #[case("100%", 7, 7)]
    #[case("150%", 10, 15)]
    #[case("25%", 3, 1)]
    #[case("-35%", 10, -4)]
    fn test_resolve_percent(#[case] raw: &str, #[case] total: i32, #[case] expected: i32) {
        let resolved = resolve(&IntOrPercent::from(raw), Some(total)).unwrap();
        assert_eq!(resolved.value, expected);
        assert!(!resolved.total_unknown);
    }

    #[test]
    fn test_resolve_absolute_is_verbatim() {
        assert_eq!(resolve(&IntOrPercent::Absolute(7), Some(3)).unwrap().value, 7);
        assert_eq!(resolve(&IntOrPercent::Absolute(-2), None).unwrap().value, -2);
    }

    #[test]
    fn test_resolve_percent_without_total() {
        let resolved = resolve(&IntOrPercent::from("40%"), None).unwrap();
        assert_eq!(resolved.value, 0);
        assert!(resolved.total_unknown);
    }

    #[test]
    fn test_resolve_saturates() {
        let resolved = resolve(&IntOrPercent::from("2147483647%"), Some(i32::MAX)).unwrap();
        assert_eq!(resolved.value, i32::MAX);
    }

    #[rstest]
    #[case("40")]
    #[case("abc%")]
    #[case("4.5%")]
    #[case("%")]
    #[case("99999999999%")]
    fn test_resolve_malformed(#[case] raw: &str) {
        assert!(resolve(&IntOrPercent::from(raw), Some(10)).is_err());
    }

    #[test]
    fn test_missing_suffix_error() {
        assert_eq!(
            parse_percent("40"),
            Err(ResolveError::MissingPercentSuffix("40".to_string()))
        );
    }

    #[test]
    fn test_bounds_defaults() {
        let (bounds, issues) = SubsetBounds::resolve(&SubsetSpec::new("a"), Some(10));
        assert!(issues.is_empty());
        assert_eq!(bounds, SubsetBounds::default());
        assert_eq!(bounds.clamp(42), 42);
    }

    #[test]
    fn test_bounds_resolve_percentages() {
        let spec = SubsetSpec::new("a")
            .with_replicas("50%")
            .with_min("20%")
            .with_max(8);
        let (bounds, issues) = SubsetBounds::resolve(&spec, Some(10));
        assert!(issues.is_empty());
        assert_eq!(bounds.replicas, Some(5));
        assert_eq!(bounds.min, 2);
        assert_eq!(bounds.max, Some(8));
        assert_eq!(bounds.clamp(1), 2);
        assert_eq!(bounds.clamp(9), 8);
    }

    #[test]
    fn test_bounds_drop_malformed_field_only() {
        let spec = SubsetSpec::new("a").with_min(2).with_max("lots");
        let (bounds, issues) = SubsetBounds::resolve(&spec, Some(10));
        assert_eq!(bounds.min, 2);
        assert_eq!(bounds.max, None);
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            &issues[0],
            ConfigurationError::Unresolvable {
                field: ReplicaField::MaxReplicas,
                ..
            }
        ));
    }

    #[test]
    fn test_bounds_clamp_negative_and_inverted() {
        let spec = SubsetSpec::new("a")
            .with_replicas(-3)
            .with_min(5)
            .with_max(2);
        let (bounds, _) = SubsetBounds::resolve(&spec, Some(10));
        assert_eq!(bounds.replicas, Some(0));
        assert_eq!(bounds.min, 5);
        assert_eq!(bounds.max, Some(5));
    }

    #[test]
    fn test_bounds_unknown_total_is_unbounded() {
        let spec = SubsetSpec::new("a")
            .with_replicas("50%")
            .with_min("10%")
            .with_max("60%");
        let (bounds, issues) = SubsetBounds::resolve(&spec, None);
        assert!(issues.is_empty());
        assert_eq!(bounds, SubsetBounds::default());
        assert!(!bounds.is_declared());
    }
}
