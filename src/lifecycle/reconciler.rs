//! Lifecycle reconciliation
//!
//! `FETCH -> DIFF -> (NOOP | APPLY) -> DONE`. Any backend failure while
//! fetching or applying is fatal and reported with the bucket name; nothing is
//! retried here.

use std::cmp::Ordering;

use crate::error::{ArchiveError, ArchiveResult};
use crate::storage::{ObjectSummary, StorageBackend};

use super::{LifecycleDocument, RetentionDelta, RetentionPolicy};

/// What a reconciliation run did to the bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The bucket already matched; no update was sent
    Unchanged(RetentionPolicy),
    /// An update was sent; `applied` is what the bucket reported back
    Updated {
        requested: RetentionDelta,
        applied: RetentionPolicy,
    },
}

impl Reconciliation {
    /// The retention policy in effect after the run
    pub fn policy(&self) -> RetentionPolicy {
        match self {
            Reconciliation::Unchanged(policy) => *policy,
            Reconciliation::Updated { applied, .. } => *applied,
        }
    }

    pub fn was_updated(&self) -> bool {
        matches!(self, Reconciliation::Updated { .. })
    }
}

/// Keeps one bucket's lifecycle in line with the configured limits
pub struct LifecycleReconciler<'a, B: StorageBackend> {
    backend: &'a B,
    bucket: &'a str,
    desired: RetentionPolicy,
}

impl<'a, B: StorageBackend> LifecycleReconciler<'a, B> {
    pub fn new(backend: &'a B, bucket: &'a str, desired: RetentionPolicy) -> Self {
        Self {
            backend,
            bucket,
            desired,
        }
    }

    pub fn bucket(&self) -> &str {
        self.bucket
    }

    /// Read the bucket's current policy without changing anything
    pub async fn current(&self) -> ArchiveResult<RetentionPolicy> {
        let document = self
            .backend
            .get_lifecycle(self.bucket)
            .await
            .map_err(|e| self.lifecycle_error(e))?;
        Ok(document.normalize())
    }

    /// Bring the bucket's lifecycle in line with the desired policy
    ///
    /// An unchanged bucket resolves with the desired policy itself; an updated
    /// one resolves with whatever the backend returned after the write.
    pub async fn enforce(&self) -> ArchiveResult<Reconciliation> {
        let observed = self.current().await?;

        let delta = self.desired.delta_from(&observed);
        if delta.is_empty() {
            return Ok(Reconciliation::Unchanged(self.desired));
        }

        let update = B::Document::build_update(&delta);
        let applied = self
            .backend
            .set_lifecycle(self.bucket, &update)
            .await
            .map_err(|e| self.lifecycle_error(e))?;

        Ok(Reconciliation::Updated {
            requested: delta,
            applied: applied.normalize(),
        })
    }

    /// Key of the most recently modified object under `prefix`
    pub async fn latest(&self, prefix: &str) -> ArchiveResult<Option<String>> {
        let mut objects = self
            .backend
            .list_by_prefix(self.bucket, prefix)
            .await
            .map_err(|e| ArchiveError::Listing {
                bucket: self.bucket.to_string(),
                cause: e.to_string(),
            })?;

        objects.sort_by(newest_first);
        Ok(objects.into_iter().next().map(|object| object.key))
    }

    fn lifecycle_error(&self, err: ArchiveError) -> ArchiveError {
        ArchiveError::Lifecycle {
            bucket: self.bucket.to_string(),
            cause: err.to_string(),
        }
    }
}

/// Newest first; equal timestamps fall back to key order
fn newest_first(a: &ObjectSummary, b: &ObjectSummary) -> Ordering {
    b.last_modified
        .cmp(&a.last_modified)
        .then_with(|| a.key.cmp(&b.key))
}
