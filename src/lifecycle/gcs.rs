//! `lifecycle.rule[]` documents (Google Cloud Storage JSON API)
//!
//! The `age` condition of this family only fires once N full days have
//! elapsed, so "after N days" is stored as `age = N + 1` and read back as
//! `N = age - 1`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{LifecycleDocument, RetentionDelta, RetentionPolicy};

/// Storage classes a rule may match or transition into
///
/// Classes this crate has no name for are carried as their raw string so
/// they are written back exactly as read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    MultiRegional,
    Regional,
    Nearline,
    Standard,
    Coldline,
    Archive,
    DurableReducedAvailability,
    #[serde(untagged)]
    Other(String),
}

/// Classes warmer than coldline; a transition rule matches all of them
const WARM_CLASSES: [StorageClass; 4] = [
    StorageClass::MultiRegional,
    StorageClass::Regional,
    StorageClass::Nearline,
    StorageClass::Standard,
];

/// Bucket resource as returned for `?fields=lifecycle`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GcsBucketLifecycle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<GcsLifecycle>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GcsLifecycle {
    #[serde(default)]
    pub rule: Vec<GcsRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcsRule {
    pub action: GcsAction,
    #[serde(default)]
    pub condition: GcsCondition,
}

/// The two actions retention is expressed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RetentionAction {
    Delete,
    SetStorageClass {
        #[serde(rename = "storageClass")]
        storage_class: StorageClass,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GcsAction {
    Retention(RetentionAction),
    /// Any other action (`AbortIncompleteMultipartUpload`, ...), kept verbatim
    Other(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcsCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches_storage_class: Vec<StorageClass>,
    /// Scoping conditions this crate does not interpret (`isLive`,
    /// `matchesPrefix`, `numNewerVersions`, `createdBefore`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GcsRule {
    fn delete_after(days: u32) -> Self {
        let mut matches = WARM_CLASSES.to_vec();
        matches.push(StorageClass::Coldline);
        Self {
            action: GcsAction::Retention(RetentionAction::Delete),
            condition: GcsCondition {
                age: Some(days.saturating_add(1)),
                matches_storage_class: matches,
                extra: Map::new(),
            },
        }
    }

    fn coldline_after(days: u32) -> Self {
        Self {
            action: GcsAction::Retention(RetentionAction::SetStorageClass {
                storage_class: StorageClass::Coldline,
            }),
            condition: GcsCondition {
                age: Some(days.saturating_add(1)),
                matches_storage_class: WARM_CLASSES.to_vec(),
                extra: Map::new(),
            },
        }
    }
}

/// Canonical policy of a `lifecycle.rule[]` document
pub fn normalize(document: &GcsBucketLifecycle) -> RetentionPolicy {
    let mut policy = RetentionPolicy::default();
    let Some(lifecycle) = &document.lifecycle else {
        return policy;
    };

    for rule in &lifecycle.rule {
        let Some(age) = rule.condition.age else {
            continue;
        };
        match &rule.action {
            GcsAction::Retention(RetentionAction::Delete) => {
                policy.delete_after_days = Some(age.saturating_sub(1))
            }
            GcsAction::Retention(RetentionAction::SetStorageClass { .. }) => {
                policy.coldline_after_days = Some(age.saturating_sub(1))
            }
            GcsAction::Other(_) => {}
        }
    }

    policy
}

/// Replacement document with one rule per field present in `delta`
pub fn build_update(delta: &RetentionDelta) -> GcsBucketLifecycle {
    let mut rules = Vec::new();
    if let Some(days) = delta.delete_after_days {
        rules.push(GcsRule::delete_after(days));
    }
    if let Some(days) = delta.coldline_after_days {
        rules.push(GcsRule::coldline_after(days));
    }

    GcsBucketLifecycle {
        lifecycle: Some(GcsLifecycle { rule: rules }),
    }
}

impl GcsRule {
    /// Whether `update` takes over this rule's job
    ///
    /// Only bucket-wide retention rules of the same action are replaced. Rules
    /// scoped by a condition this crate does not interpret stay untouched.
    fn superseded_by(&self, update: &GcsRule) -> bool {
        let same_action = matches!(
            (&self.action, &update.action),
            (
                GcsAction::Retention(RetentionAction::Delete),
                GcsAction::Retention(RetentionAction::Delete)
            ) | (
                GcsAction::Retention(RetentionAction::SetStorageClass { .. }),
                GcsAction::Retention(RetentionAction::SetStorageClass { .. })
            )
        );
        same_action && self.condition.extra.is_empty()
    }
}

/// `current` with every rule the update covers replaced by the update's rules
pub fn merge(update: &GcsBucketLifecycle, current: &GcsBucketLifecycle) -> GcsBucketLifecycle {
    let update_rules = update
        .lifecycle
        .as_ref()
        .map(|l| l.rule.as_slice())
        .unwrap_or_default();

    let mut rules: Vec<GcsRule> = current
        .lifecycle
        .iter()
        .flat_map(|l| l.rule.iter())
        .filter(|rule| !update_rules.iter().any(|u| rule.superseded_by(u)))
        .cloned()
        .collect();
    rules.extend(update_rules.iter().cloned());

    GcsBucketLifecycle {
        lifecycle: Some(GcsLifecycle { rule: rules }),
    }
}

impl LifecycleDocument for GcsBucketLifecycle {
    fn normalize(&self) -> RetentionPolicy {
        normalize(self)
    }

    fn build_update(delta: &RetentionDelta) -> Self {
        build_update(delta)
    }

    fn merge_into(&self, current: &Self) -> Self {
        merge(self, current)
    }
}
