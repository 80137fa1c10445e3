//! Tests for upload module

use super::*;
use crate::error::{Error, Result};
use crate::types::RemoteKey;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tracing_subscriber::fmt::MakeWriter;

/// Records every attempt and fails on one chosen key
#[derive(Default)]
struct FlakyUploader {
    fail_key: Option<String>,
    attempts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FlakyUploader {
    fn failing_on(key: &str) -> Self {
        Self {
            fail_key: Some(key.to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ObjectUploader for FlakyUploader {
    async fn upload(&self, _local_path: &Path, key: &RemoteKey) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.attempts.lock().unwrap().push(key.to_string());
        if self.fail_key.as_deref() == Some(key.as_str()) {
            return Err(Error::upload(key.as_str(), "access denied"));
        }
        Ok(())
    }

    fn destination(&self) -> String {
        "mem://test".to_string()
    }
}

fn make_tree(root: &Path, datasets: &[(&str, usize)]) {
    for (dataset, parts) in datasets {
        let dir = root.join(dataset);
        fs::create_dir_all(&dir).unwrap();
        for part in 1..=*parts {
            fs::write(dir.join(format!("{dataset}_1_part_{part}.json")), "[]").unwrap();
        }
    }
}

fn tasks(count: usize) -> Vec<UploadTask> {
    (1..=count)
        .map(|i| UploadTask {
            local_path: format!("/out/business/business_1_part_{i}.json").into(),
            key: RemoteKey::new("dataset", &format!("business/business_1_part_{i}.json")),
        })
        .collect()
}

// ============================================================================
// Key construction
// ============================================================================

#[test]
fn test_remote_key_example() {
    let key = remote_key(
        Path::new("output"),
        Path::new("output/business/business_100_part_1.json"),
        "dataset",
    )
    .unwrap();
    assert_eq!(key.as_str(), "dataset/business/business_100_part_1.json");
}

#[test]
fn test_remote_key_empty_prefix() {
    let key = remote_key(
        Path::new("/tmp/out"),
        Path::new("/tmp/out/tip/tip_3_part_2.json"),
        "",
    )
    .unwrap();
    assert_eq!(key.as_str(), "tip/tip_3_part_2.json");
}

#[test]
fn test_remote_key_outside_root() {
    assert!(remote_key(Path::new("/a"), Path::new("/b/c.json"), "p").is_err());
}

#[test]
fn test_collect_upload_tasks() {
    let dir = tempdir().unwrap();
    make_tree(dir.path(), &[("business", 2), ("checkin", 1)]);

    let tasks = collect_upload_tasks(dir.path(), "dataset").unwrap();
    let keys: Vec<&str> = tasks.iter().map(|t| t.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "dataset/business/business_1_part_1.json",
            "dataset/business/business_1_part_2.json",
            "dataset/checkin/checkin_1_part_1.json",
        ]
    );
    assert!(tasks.iter().all(|t| t.local_path.starts_with(dir.path())));
}

// ============================================================================
// Parallel runner
// ============================================================================

#[tokio::test]
async fn test_one_failure_does_not_stop_the_rest() {
    let uploader = Arc::new(FlakyUploader::failing_on(
        "dataset/business/business_1_part_4.json",
    ));
    let runner = ParallelUploader::with_default_workers(uploader.clone());

    let report = runner.upload_all(tasks(10)).await;

    assert_eq!(uploader.attempts.lock().unwrap().len(), 10);
    assert_eq!(report.attempted(), 10);
    assert_eq!(report.uploaded.len(), 9);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(
        report.failed[0].key.as_str(),
        "dataset/business/business_1_part_4.json"
    );
    assert!(!report.is_complete());
}

#[tokio::test]
async fn test_worker_pool_is_bounded() {
    let uploader = Arc::new(FlakyUploader::default());
    let runner = ParallelUploader::new(uploader.clone(), 3);

    let report = runner.upload_all(tasks(12)).await;

    assert!(report.is_complete());
    assert_eq!(report.uploaded.len(), 12);
    let max = uploader.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "max in flight was {max}");
    assert!(max >= 2, "uploads did not overlap");
}

#[test]
fn test_zero_workers_clamped() {
    let runner = ParallelUploader::new(Arc::new(FlakyUploader::default()), 0);
    assert_eq!(runner.max_workers(), 1);
}

#[tokio::test]
async fn test_report_into_result() {
    let uploader = Arc::new(FlakyUploader::failing_on(
        "dataset/business/business_1_part_1.json",
    ));
    let report = ParallelUploader::new(uploader, 2)
        .upload_all(tasks(3))
        .await;

    let err = report.into_result().unwrap_err();
    assert!(matches!(
        err,
        Error::UploadIncomplete {
            failed: 1,
            attempted: 3
        }
    ));
}

#[tokio::test]
async fn test_upload_dir_to_local_store() {
    let source = tempdir().unwrap();
    let bucket = tempdir().unwrap();
    make_tree(source.path(), &[("business", 2), ("user", 1)]);

    let uploader = Arc::new(ObjectStoreUploader::local(bucket.path()).unwrap());
    let report = ParallelUploader::new(uploader, 4)
        .upload_dir(source.path(), "dataset")
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.uploaded.len(), 3);
    let copied = bucket
        .path()
        .join("dataset")
        .join("business")
        .join("business_1_part_2.json");
    assert_eq!(fs::read_to_string(copied).unwrap(), "[]");
}

#[tokio::test]
async fn test_upload_overwrites_existing_object() {
    let source = tempdir().unwrap();
    let bucket = tempdir().unwrap();
    make_tree(source.path(), &[("tip", 1)]);

    let uploader = Arc::new(ObjectStoreUploader::local(bucket.path()).unwrap());
    let runner = ParallelUploader::new(uploader, 1);
    runner.upload_dir(source.path(), "").await.unwrap();

    fs::write(source.path().join("tip").join("tip_1_part_1.json"), "[1]").unwrap();
    runner.upload_dir(source.path(), "").await.unwrap();

    let copied = bucket.path().join("tip").join("tip_1_part_1.json");
    assert_eq!(fs::read_to_string(copied).unwrap(), "[1]");
}

#[tokio::test]
async fn test_missing_local_file_is_isolated() {
    let bucket = tempdir().unwrap();
    let uploader = Arc::new(ObjectStoreUploader::local(bucket.path()).unwrap());
    assert_eq!(uploader.scheme(), "file");

    let report = ParallelUploader::new(uploader, 2).upload_all(tasks(2)).await;
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed[0].error.to_string().contains("Failed to read"));
}

/// Log sink shared between the subscriber and the test
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Notes how many upload lines were logged when each upload started
struct LogWatchingUploader {
    logs: LogBuffer,
    logged_at_start: Mutex<Vec<usize>>,
}

#[async_trait]
impl ObjectUploader for LogWatchingUploader {
    async fn upload(&self, _local_path: &Path, _key: &RemoteKey) -> Result<()> {
        let logged = self.logs.contents().matches("Uploaded:").count();
        self.logged_at_start.lock().unwrap().push(logged);
        Ok(())
    }

    fn destination(&self) -> String {
        "mem://test".to_string()
    }
}

#[tokio::test]
async fn test_each_upload_logged_as_it_completes() {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let uploader = Arc::new(LogWatchingUploader {
        logs: logs.clone(),
        logged_at_start: Mutex::new(Vec::new()),
    });
    let report = ParallelUploader::new(uploader.clone(), 1)
        .upload_all(tasks(3))
        .await;

    assert!(report.is_complete());
    assert_eq!(*uploader.logged_at_start.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(logs.contents().matches("Uploaded:").count(), 3);
}
