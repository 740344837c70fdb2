//! Bucket lifecycle (retention) management
//!
//! Storage backends describe retention rules in incompatible wire formats.
//! This module normalizes them into one canonical [`RetentionPolicy`], diffs
//! that against the configured limits and writes back only what changed.
//!
//! # Architecture
//!
//! - `gcs`: the `lifecycle.rule[]` document family (ages offset by one day)
//! - `s3`: the `Rules[]` document family (ages written as-is)
//! - `reconciler`: the fetch, diff, apply state machine and latest-archive lookup

pub mod gcs;
pub mod reconciler;
pub mod s3;

use serde::{Deserialize, Serialize};

pub use gcs::GcsBucketLifecycle;
pub use reconciler::{LifecycleReconciler, Reconciliation};
pub use s3::S3LifecycleConfiguration;

/// Canonical, backend-agnostic retention settings
///
/// Both values count days since object creation. `None` means no rule of that
/// kind is configured, which is not the same as `Some(0)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_after_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coldline_after_days: Option<u32>,
}

impl RetentionPolicy {
    pub fn new(delete_after_days: Option<u32>, coldline_after_days: Option<u32>) -> Self {
        Self {
            delete_after_days,
            coldline_after_days,
        }
    }

    /// Build a policy from configured limits where zero means "not configured"
    pub fn from_limits(delete_after: u32, coldline_after: u32) -> Self {
        Self {
            delete_after_days: Some(delete_after).filter(|days| *days > 0),
            coldline_after_days: Some(coldline_after).filter(|days| *days > 0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.delete_after_days.is_none() && self.coldline_after_days.is_none()
    }

    /// Fields of `self` (the desired policy) that `observed` does not already satisfy
    pub fn delta_from(&self, observed: &RetentionPolicy) -> RetentionDelta {
        fn changed(desired: Option<u32>, observed: Option<u32>) -> Option<u32> {
            desired.filter(|days| *days > 0 && observed != Some(*days))
        }

        RetentionDelta {
            delete_after_days: changed(self.delete_after_days, observed.delete_after_days),
            coldline_after_days: changed(self.coldline_after_days, observed.coldline_after_days),
        }
    }
}

impl std::fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn days(value: Option<u32>) -> String {
            value.map_or_else(|| "unset".to_string(), |d| format!("{} days", d))
        }
        write!(
            f,
            "delete after {}, coldline after {}",
            days(self.delete_after_days),
            days(self.coldline_after_days)
        )
    }
}

/// The retention fields that must be written back to the bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionDelta {
    pub delete_after_days: Option<u32>,
    pub coldline_after_days: Option<u32>,
}

impl RetentionDelta {
    pub fn is_empty(&self) -> bool {
        self.delete_after_days.is_none() && self.coldline_after_days.is_none()
    }
}

/// A backend-specific lifecycle document
///
/// Each wire family implements both directions of the translation as pure
/// functions; nothing here talks to the network.
pub trait LifecycleDocument: Send + Sync + Sized {
    /// Read the canonical policy out of the document
    fn normalize(&self) -> RetentionPolicy;

    /// Build the replacement document carrying a rule for every field in `delta`
    fn build_update(delta: &RetentionDelta) -> Self;

    /// Overlay this update onto `current`
    ///
    /// Backends replace the whole lifecycle on write, so they send the merge
    /// instead of the bare update. Rules for concerns the update does not
    /// touch are kept as they are.
    fn merge_into(&self, current: &Self) -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_limits_treats_zero_as_unset() {
        assert_eq!(RetentionPolicy::from_limits(0, 0), RetentionPolicy::default());
        assert_eq!(
            RetentionPolicy::from_limits(30, 0),
            RetentionPolicy::new(Some(30), None)
        );
    }

    #[test]
    fn test_delta_only_contains_changed_fields() {
        let desired = RetentionPolicy::new(Some(20), Some(10));
        let observed = RetentionPolicy::new(Some(20), Some(5));

        let delta = desired.delta_from(&observed);
        assert_eq!(delta.delete_after_days, None);
        assert_eq!(delta.coldline_after_days, Some(10));
    }

    #[test]
    fn test_absent_observed_value_is_a_difference() {
        let desired = RetentionPolicy::new(Some(20), Some(10));
        let delta = desired.delta_from(&RetentionPolicy::default());
        assert_eq!(delta.delete_after_days, Some(20));
        assert_eq!(delta.coldline_after_days, Some(10));
    }

    #[test]
    fn test_unset_desired_values_never_change_the_bucket() {
        let desired = RetentionPolicy::new(None, Some(0));
        let observed = RetentionPolicy::new(Some(7), Some(3));
        assert!(desired.delta_from(&observed).is_empty());
    }

    #[test]
    fn test_display() {
        let policy = RetentionPolicy::new(Some(30), None);
        assert_eq!(policy.to_string(), "delete after 30 days, coldline after unset");
    }
}
