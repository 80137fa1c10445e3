//! Bounded parallel upload of a directory tree

use super::store::ObjectUploader;
use crate::config::DEFAULT_UPLOAD_WORKERS;
use crate::error::{Error, Result};
use crate::types::RemoteKey;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// One file to upload and its destination key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    /// Local file
    pub local_path: PathBuf,
    /// Remote key
    pub key: RemoteKey,
}

/// A single failed upload
#[derive(Debug)]
pub struct UploadFailure {
    /// Remote key that was not written
    pub key: RemoteKey,
    /// Local file that was being uploaded
    pub local_path: PathBuf,
    /// Why it failed
    pub error: Error,
}

/// Outcome of uploading a batch of files
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Keys written successfully, sorted
    pub uploaded: Vec<RemoteKey>,
    /// Uploads that failed, sorted by key
    pub failed: Vec<UploadFailure>,
}

impl UploadReport {
    /// Number of uploads attempted
    pub fn attempted(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }

    /// True when every upload succeeded
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn a partial failure into an error
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(Error::UploadIncomplete {
                failed: self.failed.len(),
                attempted: self.attempted(),
            })
        }
    }
}

/// Build the remote key for `file` under `local_root`
///
/// `output/business/business_100_part_1.json` with root `output` and prefix
/// `dataset` becomes `dataset/business/business_100_part_1.json`.
pub fn remote_key(local_root: &Path, file: &Path, prefix: &str) -> Result<RemoteKey> {
    let relative = file.strip_prefix(local_root).map_err(|_| {
        Error::input(format!(
            "{} is not under {}",
            file.display(),
            local_root.display()
        ))
    })?;

    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
        .replace('\\', "/");

    Ok(RemoteKey::new(prefix, &relative))
}

/// Recursively list every file under `root`, sorted
fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Map every file under `local_root` to an upload task
pub fn collect_upload_tasks(local_root: impl AsRef<Path>, prefix: &str) -> Result<Vec<UploadTask>> {
    let local_root = local_root.as_ref();
    walk_files(local_root)?
        .into_iter()
        .map(|local_path| {
            let key = remote_key(local_root, &local_path, prefix)?;
            Ok(UploadTask { local_path, key })
        })
        .collect()
}

/// Runs uploads with at most `max_workers` in flight
pub struct ParallelUploader {
    uploader: Arc<dyn ObjectUploader>,
    max_workers: usize,
}

impl ParallelUploader {
    /// Create a runner; `max_workers` is clamped to at least 1
    pub fn new(uploader: Arc<dyn ObjectUploader>, max_workers: usize) -> Self {
        Self {
            uploader,
            max_workers: max_workers.max(1),
        }
    }

    /// Create a runner with the default pool size
    pub fn with_default_workers(uploader: Arc<dyn ObjectUploader>) -> Self {
        Self::new(uploader, DEFAULT_UPLOAD_WORKERS)
    }

    /// Pool size
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Upload every task; one failure never stops the others
    pub async fn upload_all(&self, tasks: Vec<UploadTask>) -> UploadReport {
        let destination = self.uploader.destination();
        let uploader = &self.uploader;

        let outcomes: Vec<(UploadTask, Result<()>)> = stream::iter(tasks)
            .map(|task| {
                let destination = destination.as_str();
                async move {
                    let result = uploader.upload(&task.local_path, &task.key).await;
                    match &result {
                        Ok(()) => info!(
                            "Uploaded: {} -> {destination}/{}",
                            task.local_path.display(),
                            task.key
                        ),
                        Err(error) => warn!(
                            "Error uploading {}: {error}",
                            task.local_path.display()
                        ),
                    }
                    (task, result)
                }
            })
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        let mut report = UploadReport::default();
        for (task, result) in outcomes {
            match result {
                Ok(()) => report.uploaded.push(task.key),
                Err(error) => report.failed.push(UploadFailure {
                    key: task.key,
                    local_path: task.local_path,
                    error,
                }),
            }
        }

        report.uploaded.sort();
        report.failed.sort_by(|a, b| a.key.cmp(&b.key));
        report
    }

    /// Upload the whole tree under `local_root` beneath `prefix`
    pub async fn upload_dir(&self, local_root: impl AsRef<Path>, prefix: &str) -> Result<UploadReport> {
        let tasks = collect_upload_tasks(local_root, prefix)?;
        let report = self.upload_all(tasks).await;

        info!(
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "Upload finished"
        );
        Ok(report)
    }
}
