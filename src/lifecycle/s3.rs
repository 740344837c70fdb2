//! `Rules[]` documents (S3 bucket lifecycle configuration)
//!
//! Day counts in this family are inclusive, so they are read and written
//! without any offset. Only rules whose status is `Enabled` count.
//!
//! Fields the crate does not interpret (`Filter`, noncurrent-version actions,
//! `Expiration.Date`, ...) are kept in `extra` maps and written back as read.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{LifecycleDocument, RetentionDelta, RetentionPolicy};

pub const EXPIRE_RULE_ID: &str = "cloud-archive-expire";
pub const TRANSITION_RULE_ID: &str = "cloud-archive-coldline";

/// Storage class objects move to when they go cold
pub const COLD_STORAGE_CLASS: &str = "GLACIER";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3LifecycleConfiguration {
    #[serde(default)]
    pub rules: Vec<S3Rule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleStatus {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Rule {
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: RuleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<S3Transition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<S3Expiration>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Transition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Expiration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl S3Rule {
    fn enabled(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            status: RuleStatus::Enabled,
            prefix: Some(String::new()),
            transitions: Vec::new(),
            expiration: None,
            extra: Map::new(),
        }
    }

    fn has_retention(&self) -> bool {
        self.expiration.is_some() || !self.transitions.is_empty()
    }

    /// Whether the rule covers the whole bucket with nothing but day-based
    /// expiration and transitions
    pub fn is_plain(&self) -> bool {
        self.prefix.as_deref().unwrap_or_default().is_empty()
            && self.extra.is_empty()
            && self.expiration.as_ref().map_or(true, |e| e.extra.is_empty())
            && self.transitions.iter().all(|t| t.extra.is_empty())
    }
}

impl S3LifecycleConfiguration {
    /// Whether this update takes over the job of the current rule `rule`
    ///
    /// True for a rule sharing an ID with an update rule. Otherwise only an
    /// enabled plain rule is taken over, and only when the update sets every
    /// concern (expiration, transition) the rule sets.
    pub fn supersedes(&self, rule: &S3Rule) -> bool {
        if let Some(id) = rule.id.as_deref() {
            if self.rules.iter().any(|u| u.id.as_deref() == Some(id)) {
                return true;
            }
        }

        let expires = self.rules.iter().any(|r| r.expiration.is_some());
        let transitions = self.rules.iter().any(|r| !r.transitions.is_empty());
        let covered = (rule.expiration.is_none() || expires)
            && (rule.transitions.is_empty() || transitions);

        rule.status == RuleStatus::Enabled && rule.is_plain() && rule.has_retention() && covered
    }
}

/// Canonical policy of a `Rules[]` document
pub fn normalize(document: &S3LifecycleConfiguration) -> RetentionPolicy {
    document
        .rules
        .iter()
        .filter(|rule| rule.status == RuleStatus::Enabled)
        .fold(RetentionPolicy::default(), |mut policy, rule| {
            if let Some(days) = rule.transitions.first().and_then(|t| t.days) {
                policy.coldline_after_days = Some(days);
            }
            if let Some(days) = rule.expiration.as_ref().and_then(|e| e.days) {
                policy.delete_after_days = Some(days);
            }
            policy
        })
}

/// Replacement document with one enabled rule per field present in `delta`
pub fn build_update(delta: &RetentionDelta) -> S3LifecycleConfiguration {
    let mut rules = Vec::new();
    if let Some(days) = delta.delete_after_days {
        let mut rule = S3Rule::enabled(EXPIRE_RULE_ID);
        rule.expiration = Some(S3Expiration {
            days: Some(days),
            extra: Map::new(),
        });
        rules.push(rule);
    }
    if let Some(days) = delta.coldline_after_days {
        let mut rule = S3Rule::enabled(TRANSITION_RULE_ID);
        rule.transitions.push(S3Transition {
            days: Some(days),
            storage_class: Some(COLD_STORAGE_CLASS.to_string()),
            extra: Map::new(),
        });
        rules.push(rule);
    }
    S3LifecycleConfiguration { rules }
}

/// `current` without the rules the update supersedes, followed by the update
pub fn merge(
    update: &S3LifecycleConfiguration,
    current: &S3LifecycleConfiguration,
) -> S3LifecycleConfiguration {
    let mut rules: Vec<S3Rule> = current
        .rules
        .iter()
        .filter(|rule| !update.supersedes(rule))
        .cloned()
        .collect();
    rules.extend(update.rules.iter().cloned());

    S3LifecycleConfiguration { rules }
}

impl LifecycleDocument for S3LifecycleConfiguration {
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
