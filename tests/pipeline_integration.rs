//! Integration tests for the full pipeline
//!
//! Tests the end-to-end flow: NDJSON inputs → batch files → local object
//! store → recorded warehouse statements

use async_trait::async_trait;
use flakeload::credentials::{ConfigCredentialProvider, EnvCredentialProvider};
use flakeload::upload::ObjectStoreUploader;
use flakeload::warehouse::{SqlExecutor, StatementOutcome};
use flakeload::{Error, Pipeline, PipelineConfig, Result};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

// ============================================================================
// Fixtures
// ============================================================================

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("raw")).unwrap();
        Self { dir }
    }

    fn input(&self) -> PathBuf {
        self.dir.path().join("raw")
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("split")
    }

    fn bucket(&self) -> PathBuf {
        self.dir.path().join("bucket")
    }

    fn write_ndjson(&self, name: &str, records: &[Value]) {
        let body: String = records.iter().map(|r| format!("{r}\n")).collect();
        fs::write(self.input().join(name), body).unwrap();
    }

    fn config_path(&self, no_of_lines: usize) -> PathBuf {
        let key = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/rsa_key.p8");
        let content = format!(
            r"
[STAGING]
input_dataset_path = {input}
output_folder_path = {output}
no_of_lines = {no_of_lines}
upload_workers = 4

[AWS]
aws_access_key_id = AKIAEXAMPLE
aws_secret_access_key = s3cr3t
aws_region = us-east-1
s3_bucket_name = yelp-bucket
s3_bucket_path = s3://yelp-bucket/dataset/

[SNOWFLAKE]
private_key_file_path = {key}
raw_database = RAW
raw_schema = YELP
warehouse = COMPUTE_WH
account = myorg-acct
role = LOADER
user = ETL_USER
",
            input = self.input().display(),
            output = self.output().display(),
            key = key.display(),
        );
        let path = self.dir.path().join("config.ini");
        fs::write(&path, content).unwrap();
        path
    }

    fn pipeline(&self, no_of_lines: usize, executor: Arc<RecordingExecutor>) -> Pipeline {
        let config = PipelineConfig::from_file(self.config_path(no_of_lines)).unwrap();
        let credentials = Arc::new(ConfigCredentialProvider::new(config.clone()));
        let uploader = Arc::new(ObjectStoreUploader::local(self.bucket()).unwrap());
        Pipeline::new(config, credentials)
            .with_uploader(uploader)
            .with_executor(executor)
    }
}

#[derive(Default)]
struct RecordingExecutor {
    statements: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str) -> Result<StatementOutcome> {
        self.statements.lock().unwrap().push(sql.to_string());
        Ok(StatementOutcome::default())
    }
}

fn records(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|i| json!({"id": i, "name": format!("record {i}")}))
        .collect()
}

// ============================================================================
// Full pipeline
// ============================================================================

#[tokio::test]
async fn test_full_pipeline_split_upload_load() {
    let fixture = Fixture::new();
    fixture.write_ndjson("yelp_academic_dataset_business.json", &records(250));
    fixture.write_ndjson("yelp_academic_dataset_tip.json", &records(3));

    let executor = Arc::new(RecordingExecutor::default());
    let report = fixture.pipeline(100, executor.clone()).run().await.unwrap();

    // Split
    assert_eq!(report.total_records(), 253);
    let business = fixture.output().join("business");
    let mut names: Vec<String> = fs::read_dir(&business)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "business_100_part_1.json",
            "business_100_part_2.json",
            "business_50_part_3.json",
        ]
    );

    let last: Vec<Value> =
        serde_json::from_str(&fs::read_to_string(business.join("business_50_part_3.json")).unwrap())
            .unwrap();
    assert_eq!(last.len(), 50);
    assert_eq!(last[0]["id"], 201);

    let tip = fs::read_to_string(fixture.output().join("tip").join("tip_3_part_1.json")).unwrap();
    assert!(tip.starts_with("[\n    {\n        \"id\": 1,"));

    // Upload
    assert!(report.upload.is_complete());
    assert_eq!(report.upload.uploaded.len(), 4);
    let uploaded = fixture
        .bucket()
        .join("dataset")
        .join("business")
        .join("business_100_part_2.json");
    assert_eq!(
        fs::read(&uploaded).unwrap(),
        fs::read(business.join("business_100_part_2.json")).unwrap()
    );

    // Load
    let statements = executor.statements();
    assert_eq!(statements.len(), 5);
    assert!(statements[0].starts_with("CREATE STAGE IF NOT EXISTS RAW.YELP.S3_STAGE"));
    assert!(statements[0].contains("URL = 's3://yelp-bucket/dataset'"));
    assert!(statements[2].contains("FROM @RAW.YELP.S3_STAGE/business/"));
    assert!(statements[4].starts_with("COPY INTO RAW.YELP.tip"));
    assert_eq!(
        report.load.tables.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        vec!["business", "tip"]
    );
}

#[tokio::test]
async fn test_rerun_replaces_previous_output() {
    let fixture = Fixture::new();
    fixture.write_ndjson("yelp_academic_dataset_user.json", &records(10));

    let executor = Arc::new(RecordingExecutor::default());
    fixture.pipeline(3, executor.clone()).run().await.unwrap();
    assert_eq!(fs::read_dir(fixture.output().join("user")).unwrap().count(), 4);

    let report = fixture.pipeline(5, executor).run().await.unwrap();
    let mut names: Vec<String> = fs::read_dir(fixture.output().join("user"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["user_5_part_1.json", "user_5_part_2.json"]);
    assert_eq!(report.upload.uploaded.len(), 2);
}

#[tokio::test]
async fn test_malformed_line_aborts_before_upload() {
    let fixture = Fixture::new();
    fs::write(
        fixture.input().join("yelp_academic_dataset_review.json"),
        "{\"id\": 1}\n{not json}\n",
    )
    .unwrap();

    let executor = Arc::new(RecordingExecutor::default());
    let err = fixture.pipeline(10, executor.clone()).run().await.unwrap_err();

    assert!(matches!(err, Error::MalformedLine { line: 2, .. }));
    assert!(!fixture.bucket().join("dataset").exists());
    assert!(executor.statements().is_empty());
}

#[tokio::test]
async fn test_dataset_collision_rejected() {
    let fixture = Fixture::new();
    fixture.write_ndjson("yelp_academic_dataset_checkin.json", &records(1));
    fixture.write_ndjson("archive_checkin.json", &records(1));

    let executor = Arc::new(RecordingExecutor::default());
    let err = fixture.pipeline(10, executor.clone()).run().await.unwrap_err();

    assert!(err.is_validation());
    assert!(!fixture.output().exists());
    assert!(executor.statements().is_empty());
}

#[tokio::test]
async fn test_env_credentials_feed_stage_statement() {
    let fixture = Fixture::new();
    fixture.write_ndjson("yelp_academic_dataset_tip.json", &records(1));

    let config = PipelineConfig::from_file(fixture.config_path(10)).unwrap();
    let key = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/rsa_key.p8");
    let credentials = Arc::new(EnvCredentialProvider::from_vars([
        ("AWS_ACCESS_KEY_ID".to_string(), "AKIAFROMENV".to_string()),
        ("AWS_SECRET_ACCESS_KEY".to_string(), "envsecret".to_string()),
        ("AWS_REGION".to_string(), "eu-west-1".to_string()),
        (
            "SNOWFLAKE_PRIVATE_KEY_PATH".to_string(),
            key.display().to_string(),
        ),
    ]));
    let executor = Arc::new(RecordingExecutor::default());

    Pipeline::new(config, credentials)
        .with_uploader(Arc::new(ObjectStoreUploader::local(fixture.bucket()).unwrap()))
        .with_executor(executor.clone())
        .run()
        .await
        .unwrap();

    let stage = &executor.statements()[0];
    assert!(stage.contains("AWS_KEY_ID = 'AKIAFROMENV'"));
    assert!(stage.contains("AWS_SECRET_KEY = 'envsecret'"));
}
