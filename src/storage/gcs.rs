//! Google Cloud Storage backend
//!
//! Talks to the GCS JSON API directly with `reqwest`. Authentication is a
//! bearer token taken from `GCS_ACCESS_TOKEN` (for example the output of
//! `gcloud auth print-access-token`). `GCS_ENDPOINT` points the backend at an
//! emulator or proxy instead of `https://storage.googleapis.com`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::debug;

use crate::error::{ArchiveError, ArchiveResult};
use crate::lifecycle::{GcsBucketLifecycle, LifecycleDocument};

use super::{save_download, DownloadedArchive, ObjectSummary, StorageBackend};

pub const ACCESS_TOKEN_ENV: &str = "GCS_ACCESS_TOKEN";
pub const ENDPOINT_ENV: &str = "GCS_ENDPOINT";
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const ARCHIVE_CONTENT_TYPE: &str = "application/gzip";

const COMPONENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT_ENCODE_SET).to_string()
}

/// One page of an object listing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectPage {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
    updated: DateTime<Utc>,
}

impl From<ObjectResource> for ObjectSummary {
    fn from(object: ObjectResource) -> Self {
        ObjectSummary {
            key: object.name,
            last_modified: object.updated,
        }
    }
}

/// GCS JSON API client
#[derive(Debug, Clone)]
pub struct GcsBackend {
    client: Client,
    endpoint: String,
    token: String,
}

impl GcsBackend {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> ArchiveResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ArchiveError::Storage(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Build a backend from `GCS_ACCESS_TOKEN` and `GCS_ENDPOINT`
    pub fn from_env() -> ArchiveResult<Self> {
        let token = std::env::var(ACCESS_TOKEN_ENV).map_err(|_| {
            ArchiveError::Config(format!("{} must be set to use the GCS backend", ACCESS_TOKEN_ENV))
        })?;
        let endpoint =
            std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        Self::new(endpoint, token)
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!(
            "{}/storage/v1/b/{}?fields=lifecycle",
            self.endpoint,
            encode(bucket)
        )
    }

    fn list_url(&self, bucket: &str, prefix: &str, page_token: Option<&str>) -> String {
        let mut url = format!(
            "{}/storage/v1/b/{}/o?prefix={}&fields=items(name,updated),nextPageToken",
            self.endpoint,
            encode(bucket),
            encode(prefix)
        );
        if let Some(token) = page_token {
            url.push_str("&pageToken=");
            url.push_str(&encode(token));
        }
        url
    }

    fn media_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            self.endpoint,
            encode(bucket),
            encode(key)
        )
    }

    fn upload_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.endpoint,
            encode(bucket),
            encode(key)
        )
    }

    async fn send(&self, request: RequestBuilder) -> ArchiveResult<Response> {
        request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ArchiveError::Storage(format!("request failed: {}", e)))
    }
}

/// Turn a non-success response into a storage error carrying the body text
async fn check(response: Response) -> ArchiveResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ArchiveError::Storage(format!(
        "GCS returned status {}: {}",
        status,
        body.trim()
    )))
}

async fn read_json<T: serde::de::DeserializeOwned + Default>(response: Response) -> ArchiveResult<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| ArchiveError::Storage(format!("failed to read response: {}", e)))?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&body)
        .map_err(|e| ArchiveError::Storage(format!("invalid response from GCS: {}", e)))
}

#[async_trait]
impl StorageBackend for GcsBackend {
    type Document = GcsBucketLifecycle;

    async fn get_lifecycle(&self, bucket: &str) -> ArchiveResult<GcsBucketLifecycle> {
        let response = self.send(self.client.get(self.bucket_url(bucket))).await?;
        read_json(check(response).await?).await
    }

    async fn set_lifecycle(
        &self,
        bucket: &str,
        document: &GcsBucketLifecycle,
    ) -> ArchiveResult<GcsBucketLifecycle> {
        let merged = document.merge_into(&self.get_lifecycle(bucket).await?);
        debug!(%bucket, "Patching GCS bucket lifecycle");
        let request = self.client.patch(self.bucket_url(bucket)).json(&merged);
        let response = self.send(request).await?;
        read_json(check(response).await?).await
    }

    async fn list_by_prefix(&self, bucket: &str, prefix: &str) -> ArchiveResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.list_url(bucket, prefix, page_token.as_deref());
            let response = self.send(self.client.get(url)).await?;
            let page: ObjectPage = read_json(check(response).await?).await?;

            objects.extend(page.items.into_iter().map(ObjectSummary::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(%bucket, %prefix, count = objects.len(), "Listed GCS objects");
        Ok(objects)
    }

    async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> ArchiveResult<Option<DownloadedArchive>> {
        let response = self.send(self.client.get(self.media_url(bucket, key))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = check(response)
            .await?
            .bytes_stream()
            .map_err(std::io::Error::other);
        save_download(StreamReader::new(Box::pin(body)), destination).await
    }

    async fn upload(&self, bucket: &str, source: &Path, key: &str) -> ArchiveResult<()> {
        let file = tokio::fs::File::open(source).await.map_err(|e| {
            ArchiveError::Io(format!("Failed to read {}: {}", source.display(), e))
        })?;
        let length = file.metadata().await?.len();

        let request = self
            .client
            .post(self.upload_url(bucket, key))
            .header(reqwest::header::CONTENT_TYPE, ARCHIVE_CONTENT_TYPE)
            .header(reqwest::header::CONTENT_LENGTH, length)
            .body(Body::wrap_stream(ReaderStream::new(file)));
        check(self.send(request).await?).await?;
        Ok(())
    }
}
