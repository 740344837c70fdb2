//! Amazon S3 backend
//!
//! Built on `aws-sdk-s3` with the default `aws-config` credential and region
//! chain, so `AWS_PROFILE`, `AWS_REGION`, `AWS_ENDPOINT_URL` and friends work
//! as they do for the AWS CLI.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLifecycleConfiguration, ExpirationStatus, LifecycleExpiration, LifecycleRule,
    Transition, TransitionStorageClass,
};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ArchiveError, ArchiveResult};
use crate::lifecycle::s3::{RuleStatus, S3Expiration, S3Rule, S3Transition};
use crate::lifecycle::S3LifecycleConfiguration;

use super::{save_download, DownloadedArchive, ObjectSummary, StorageBackend};

const NO_LIFECYCLE_CODE: &str = "NoSuchLifecycleConfiguration";

fn storage_error(context: &str, err: impl std::error::Error) -> ArchiveError {
    ArchiveError::Storage(format!("{}: {}", context, DisplayErrorContext(err)))
}

/// S3 client wrapper
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
}

impl S3Backend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a backend from the ambient AWS configuration
    pub async fn from_env() -> Self {
        let conf = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        Self::new(Client::new(&conf))
    }
}

fn days_from_sdk(days: Option<i32>) -> Option<u32> {
    days.and_then(|d| u32::try_from(d).ok())
}

fn days_to_sdk(days: Option<u32>) -> ArchiveResult<Option<i32>> {
    days.map(|d| {
        i32::try_from(d)
            .map_err(|_| ArchiveError::Config(format!("{} days is out of range for S3", d)))
    })
    .transpose()
}

fn described(value: impl std::fmt::Debug) -> Value {
    Value::String(format!("{:?}", value))
}

/// Rule-level parts of an SDK rule the document does not model
fn unmodeled_parts(rule: &LifecycleRule) -> Map<String, Value> {
    let mut extra = Map::new();
    if let Some(filter) = rule.filter() {
        extra.insert("Filter".into(), described(filter));
    }
    if let Some(expiration) = rule.noncurrent_version_expiration() {
        extra.insert("NoncurrentVersionExpiration".into(), described(expiration));
    }
    if !rule.noncurrent_version_transitions().is_empty() {
        extra.insert(
            "NoncurrentVersionTransitions".into(),
            described(rule.noncurrent_version_transitions()),
        );
    }
    if let Some(abort) = rule.abort_incomplete_multipart_upload() {
        extra.insert("AbortIncompleteMultipartUpload".into(), described(abort));
    }
    extra
}

#[allow(deprecated)]
fn rule_from_sdk(rule: &LifecycleRule) -> S3Rule {
    S3Rule {
        id: rule.id().map(str::to_string),
        status: match rule.status() {
            ExpirationStatus::Enabled => RuleStatus::Enabled,
            _ => RuleStatus::Disabled,
        },
        prefix: rule.prefix().map(str::to_string),
        transitions: rule
            .transitions()
            .iter()
            .map(|t| {
                let mut extra = Map::new();
                if let Some(date) = t.date() {
                    extra.insert("Date".into(), described(date));
                }
                S3Transition {
                    days: days_from_sdk(t.days()),
                    storage_class: t.storage_class().map(|c| c.as_str().to_string()),
                    extra,
                }
            })
            .collect(),
        expiration: rule.expiration().map(|e| {
            let mut extra = Map::new();
            if let Some(date) = e.date() {
                extra.insert("Date".into(), described(date));
            }
            if let Some(marker) = e.expired_object_delete_marker() {
                extra.insert("ExpiredObjectDeleteMarker".into(), Value::Bool(marker));
            }
            S3Expiration {
                days: days_from_sdk(e.days()),
                extra,
            }
        }),
        extra: unmodeled_parts(rule),
    }
}

/// Convert an SDK rule list into the crate's lifecycle document
pub fn configuration_from_sdk(rules: &[LifecycleRule]) -> S3LifecycleConfiguration {
    S3LifecycleConfiguration {
        rules: rules.iter().map(rule_from_sdk).collect(),
    }
}

/// Build an SDK rule from one the crate wrote; `extra` fields are not carried
#[allow(deprecated)]
fn rule_to_sdk(rule: &S3Rule) -> ArchiveResult<LifecycleRule> {
    let status = match rule.status {
        RuleStatus::Enabled => ExpirationStatus::Enabled,
        RuleStatus::Disabled => ExpirationStatus::Disabled,
    };

    let mut builder = LifecycleRule::builder()
        .set_id(rule.id.clone())
        .status(status)
        .prefix(rule.prefix.clone().unwrap_or_default());

    for transition in &rule.transitions {
        builder = builder.transitions(
            Transition::builder()
                .set_days(days_to_sdk(transition.days)?)
                .set_storage_class(
                    transition
                        .storage_class
                        .as_deref()
                        .map(TransitionStorageClass::from),
                )
                .build(),
        );
    }

    if let Some(expiration) = &rule.expiration {
        builder = builder.expiration(
            LifecycleExpiration::builder()
                .set_days(days_to_sdk(expiration.days)?)
                .build(),
        );
    }

    builder
        .build()
        .map_err(|e| ArchiveError::Storage(format!("invalid lifecycle rule: {}", e)))
}

/// Convert the crate's lifecycle document into the SDK request shape
pub fn configuration_to_sdk(
    document: &S3LifecycleConfiguration,
) -> ArchiveResult<BucketLifecycleConfiguration> {
    let rules = document
        .rules
        .iter()
        .map(rule_to_sdk)
        .collect::<ArchiveResult<Vec<_>>>()?;
    build_configuration(rules)
}

fn build_configuration(rules: Vec<LifecycleRule>) -> ArchiveResult<BucketLifecycleConfiguration> {
    BucketLifecycleConfiguration::builder()
        .set_rules(Some(rules))
        .build()
        .map_err(|e| ArchiveError::Storage(format!("invalid lifecycle configuration: {}", e)))
}

/// The bucket's current SDK rules minus those `update` supersedes, followed
/// by the update's rules
///
/// Kept rules are passed through as the SDK returned them.
pub fn merge_sdk_rules(
    update: &S3LifecycleConfiguration,
    current: Vec<LifecycleRule>,
) -> ArchiveResult<Vec<LifecycleRule>> {
    let mut rules: Vec<LifecycleRule> = current
        .into_iter()
        .filter(|rule| !update.supersedes(&rule_from_sdk(rule)))
        .collect();
    for rule in &update.rules {
        rules.push(rule_to_sdk(rule)?);
    }
    Ok(rules)
}

impl S3Backend {
    async fn current_rules(&self, bucket: &str) -> ArchiveResult<Vec<LifecycleRule>> {
        match self
            .client
            .get_bucket_lifecycle_configuration()
            .bucket(bucket)
            .send()
            .await
        {
            Ok(output) => Ok(output.rules.unwrap_or_default()),
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .and_then(|e| e.code())
                    == Some(NO_LIFECYCLE_CODE);
                if missing {
                    Ok(Vec::new())
                } else {
                    Err(storage_error("failed to read lifecycle configuration", err))
                }
            }
        }
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    type Document = S3LifecycleConfiguration;

    async fn get_lifecycle(&self, bucket: &str) -> ArchiveResult<S3LifecycleConfiguration> {
        Ok(configuration_from_sdk(&self.current_rules(bucket).await?))
    }

    async fn set_lifecycle(
        &self,
        bucket: &str,
        document: &S3LifecycleConfiguration,
    ) -> ArchiveResult<S3LifecycleConfiguration> {
        let rules = merge_sdk_rules(document, self.current_rules(bucket).await?)?;
        debug!(%bucket, rules = rules.len(), "Putting S3 bucket lifecycle");
        self.client
            .put_bucket_lifecycle_configuration()
            .bucket(bucket)
            .lifecycle_configuration(build_configuration(rules)?)
            .send()
            .await
            .map_err(|e| storage_error("failed to write lifecycle configuration", e))?;

        // the put response carries no body; read back what the bucket now holds
        self.get_lifecycle(bucket).await
    }

    async fn list_by_prefix(&self, bucket: &str, prefix: &str) -> ArchiveResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| storage_error("failed to list objects", e))?;

            for object in output.contents() {
                let (Some(key), Some(modified)) = (object.key(), object.last_modified()) else {
                    continue;
                };
                let Some(last_modified) =
                    DateTime::<Utc>::from_timestamp(modified.secs(), modified.subsec_nanos())
                else {
                    continue;
                };
                objects.push(ObjectSummary {
                    key: key.to_string(),
                    last_modified,
                });
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string())
                }
                _ => break,
            }
        }

        debug!(%bucket, %prefix, count = objects.len(), "Listed S3 objects");
        Ok(objects)
    }

    async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> ArchiveResult<Option<DownloadedArchive>> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(storage_error("failed to download object", err));
            }
        };

        save_download(output.body.into_async_read(), destination).await
    }

    async fn upload(&self, bucket: &str, source: &Path, key: &str) -> ArchiveResult<()> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| ArchiveError::Io(format!("Failed to read {}: {}", source.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/gzip")
            .body(body)
            .send()
            .await
            .map_err(|e| storage_error("failed to upload object", e))?;
        Ok(())
    }
}
