//! In-memory collaborators for unit tests
//!
//! Every mock is cheap to clone and clones share state, so a test can hand one
//! copy to the code under test and keep another to inspect recorded calls.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::archive::{FileSelector, Packager};
use crate::error::{ArchiveError, ArchiveResult};
use crate::events::{ArchiveEvent, EventSink};
use crate::lifecycle::LifecycleDocument;
use crate::storage::{DownloadedArchive, ObjectSummary, StorageBackend};

pub fn summary(key: &str, last_modified: &str) -> ObjectSummary {
    ObjectSummary {
        key: key.to_string(),
        last_modified: DateTime::parse_from_rfc3339(last_modified)
            .unwrap()
            .with_timezone(&Utc),
    }
}

/// What a mocked download does
#[derive(Debug, Clone)]
pub enum DownloadBehavior {
    /// Write these bytes to the destination
    Payload(Vec<u8>),
    /// Report that the object does not exist
    Missing,
    /// Fail with this message
    Fail(String),
}

/// A recorded upload: the key and whether the source file existed at the time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCall {
    pub source: PathBuf,
    pub key: String,
    pub source_existed: bool,
}

struct MockState<D> {
    current: D,
    response: Option<D>,
    apply_updates: bool,
    set_calls: Vec<D>,
    get_error: Option<String>,
    set_error: Option<String>,
    objects: Vec<ObjectSummary>,
    list_error: Option<String>,
    list_calls: Vec<String>,
    download: DownloadBehavior,
    download_calls: Vec<String>,
    upload_error: Option<String>,
    upload_calls: Vec<UploadCall>,
}

/// Storage backend backed by memory
pub struct MockBackend<D> {
    state: Arc<Mutex<MockState<D>>>,
}

impl<D> Clone for MockBackend<D> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<D: LifecycleDocument + Clone> MockBackend<D> {
    pub fn new(current: D) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                current,
                response: None,
                apply_updates: false,
                set_calls: Vec::new(),
                get_error: None,
                set_error: None,
                objects: Vec::new(),
                list_error: None,
                list_calls: Vec::new(),
                download: DownloadBehavior::Missing,
                download_calls: Vec::new(),
                upload_error: None,
                upload_calls: Vec::new(),
            })),
        }
    }

    /// Make `set_lifecycle` store the update so later reads observe it
    pub fn applying_updates(self) -> Self {
        self.state.lock().unwrap().apply_updates = true;
        self
    }

    pub fn set_response(&self, document: D) {
        self.state.lock().unwrap().response = Some(document);
    }

    pub fn set_objects(&self, objects: Vec<ObjectSummary>) {
        self.state.lock().unwrap().objects = objects;
    }

    pub fn set_download(&self, behavior: DownloadBehavior) {
        self.state.lock().unwrap().download = behavior;
    }

    pub fn fail_get_lifecycle(&self, message: &str) {
        self.state.lock().unwrap().get_error = Some(message.to_string());
    }

    pub fn fail_set_lifecycle(&self, message: &str) {
        self.state.lock().unwrap().set_error = Some(message.to_string());
    }

    pub fn fail_list(&self, message: &str) {
        self.state.lock().unwrap().list_error = Some(message.to_string());
    }

    pub fn fail_upload(&self, message: &str) {
        self.state.lock().unwrap().upload_error = Some(message.to_string());
    }

    pub fn set_calls(&self) -> Vec<D> {
        self.state.lock().unwrap().set_calls.clone()
    }

    pub fn list_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().list_calls.clone()
    }

    pub fn download_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().download_calls.clone()
    }

    pub fn upload_calls(&self) -> Vec<UploadCall> {
        self.state.lock().unwrap().upload_calls.clone()
    }
}

#[async_trait]
impl<D: LifecycleDocument + Clone> StorageBackend for MockBackend<D> {
    type Document = D;

    async fn get_lifecycle(&self, _bucket: &str) -> ArchiveResult<D> {
        let state = self.state.lock().unwrap();
        match &state.get_error {
            Some(message) => Err(ArchiveError::Storage(message.clone())),
            None => Ok(state.current.clone()),
        }
    }

    async fn set_lifecycle(&self, _bucket: &str, document: &D) -> ArchiveResult<D> {
        let mut state = self.state.lock().unwrap();
        state.set_calls.push(document.clone());
        if let Some(message) = &state.set_error {
            return Err(ArchiveError::Storage(message.clone()));
        }
        if state.apply_updates {
            state.current = document.clone();
        }
        Ok(state.response.clone().unwrap_or_else(|| document.clone()))
    }

    async fn list_by_prefix(&self, _bucket: &str, prefix: &str) -> ArchiveResult<Vec<ObjectSummary>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls.push(prefix.to_string());
        if let Some(message) = &state.list_error {
            return Err(ArchiveError::Storage(message.clone()));
        }
        Ok(state
            .objects
            .iter()
            .filter(|object| object.key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn download(
        &self,
        _bucket: &str,
        key: &str,
        destination: &Path,
    ) -> ArchiveResult<Option<DownloadedArchive>> {
        let behavior = {
            let mut state = self.state.lock().unwrap();
            state.download_calls.push(key.to_string());
            state.download.clone()
        };

        match behavior {
            DownloadBehavior::Payload(bytes) => {
                std::fs::write(destination, bytes)?;
                Ok(Some(DownloadedArchive {
                    file: destination.to_path_buf(),
                    dir: destination
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_default(),
                }))
            }
            DownloadBehavior::Missing => Ok(None),
            DownloadBehavior::Fail(message) => Err(ArchiveError::Storage(message)),
        }
    }

    async fn upload(&self, _bucket: &str, source: &Path, key: &str) -> ArchiveResult<()> {
        let mut state = self.state.lock().unwrap();
        state.upload_calls.push(UploadCall {
            source: source.to_path_buf(),
            key: key.to_string(),
            source_existed: source.exists(),
        });
        match &state.upload_error {
            Some(message) => Err(ArchiveError::Storage(message.clone())),
            None => Ok(()),
        }
    }
}

/// File selector returning a fixed list relative to the base directory
#[derive(Clone, Default)]
pub struct MockSelector {
    names: Vec<String>,
    error: Option<String>,
}

impl MockSelector {
    pub fn returning(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            error: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            names: Vec::new(),
            error: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl FileSelector for MockSelector {
    async fn select(&self, base_dir: &Path, _patterns: &[String]) -> ArchiveResult<Vec<PathBuf>> {
        match &self.error {
            Some(message) => Err(ArchiveError::Io(message.clone())),
            None => Ok(self.names.iter().map(|name| base_dir.join(name)).collect()),
        }
    }
}

#[derive(Default)]
struct PackagerState {
    pack_calls: Vec<Vec<PathBuf>>,
    unpack_calls: Vec<DownloadedArchive>,
    pack_error: Option<String>,
    unpack_error: Option<String>,
    output_dir: Option<PathBuf>,
    extracted: Vec<(PathBuf, Vec<u8>)>,
}

/// Packager that writes a placeholder archive and records its inputs
#[derive(Clone, Default)]
pub struct MockPackager {
    state: Arc<Mutex<PackagerState>>,
}

impl MockPackager {
    pub fn fail_pack(&self, message: &str) {
        self.state.lock().unwrap().pack_error = Some(message.to_string());
    }

    pub fn fail_unpack(&self, message: &str) {
        self.state.lock().unwrap().unpack_error = Some(message.to_string());
    }

    /// Write archives into `dir` instead of the requested destination
    pub fn write_into(&self, dir: &Path) {
        self.state.lock().unwrap().output_dir = Some(dir.to_path_buf());
    }

    /// Write `contents` to `path` on every successful unpack
    pub fn extracting(&self, path: &Path, contents: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .extracted
            .push((path.to_path_buf(), contents.to_vec()));
    }

    pub fn pack_calls(&self) -> Vec<Vec<PathBuf>> {
        self.state.lock().unwrap().pack_calls.clone()
    }

    pub fn unpack_calls(&self) -> Vec<DownloadedArchive> {
        self.state.lock().unwrap().unpack_calls.clone()
    }
}

#[async_trait]
impl Packager for MockPackager {
    async fn pack(
        &self,
        _base_dir: &Path,
        files: &[PathBuf],
        archive_name: &str,
        destination_dir: &Path,
    ) -> ArchiveResult<PathBuf> {
        let mut state = self.state.lock().unwrap();
        state.pack_calls.push(files.to_vec());
        if let Some(message) = &state.pack_error {
            return Err(ArchiveError::Io(message.clone()));
        }
        let archive = state
            .output_dir
            .as_deref()
            .unwrap_or(destination_dir)
            .join(archive_name);
        std::fs::write(&archive, b"packed")?;
        Ok(archive)
    }

    async fn unpack(&self, _target_dir: &Path, archive: &DownloadedArchive) -> ArchiveResult<Vec<PathBuf>> {
        let mut state = self.state.lock().unwrap();
        state.unpack_calls.push(archive.clone());
        if let Some(message) = &state.unpack_error {
            return Err(ArchiveError::Io(message.clone()));
        }
        for (path, contents) in &state.extracted {
            std::fs::write(path, contents)?;
        }
        Ok(state.extracted.iter().map(|(path, _)| path.clone()).collect())
    }
}

/// Event sink that keeps every event in memory
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ArchiveEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ArchiveEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ArchiveEvent) {
        self.events.lock().unwrap().push(event);
    }
}
