//! Pipeline module
//!
//! Runs split, upload and load in sequence for every input file.
//!
//! # Overview
//!
//! - `Pipeline` - Owns the parsed configuration and a credential provider
//! - `PipelineReport` - What each stage did
//!
//! Everything that can be rejected up front (paths, dataset names,
//! collisions, credentials) is checked before the first directory is touched.

mod types;

pub use types::PipelineReport;

use crate::config::PipelineConfig;
use crate::credentials::{CredentialProvider, ObjectStoreCredentials};
use crate::error::{Error, Result};
use crate::split::{discover_inputs, FileSplitter};
use crate::types::DatasetName;
use crate::upload::{ObjectStoreUploader, ObjectUploader, ParallelUploader};
use crate::warehouse::{
    ConnectionParams, LoadSettings, SnowflakeConnection, SqlExecutor, WarehouseLoader,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// End-to-end split, upload and load
pub struct Pipeline {
    /// Parsed configuration
    config: PipelineConfig,
    /// Secrets source
    credentials: Arc<dyn CredentialProvider>,
    /// Object store override
    uploader: Option<Arc<dyn ObjectUploader>>,
    /// Warehouse override
    executor: Option<Arc<dyn SqlExecutor>>,
}

impl Pipeline {
    /// Create a pipeline over an already parsed configuration
    pub fn new(config: PipelineConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            config,
            credentials,
            uploader: None,
            executor: None,
        }
    }

    /// Upload through `uploader` instead of the configured bucket
    #[must_use]
    pub fn with_uploader(mut self, uploader: Arc<dyn ObjectUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Run statements through `executor` instead of a Snowflake connection
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn SqlExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage
    ///
    /// Inputs, dataset names and credentials are all resolved before the
    /// output root is touched.
    pub async fn run(&self) -> Result<PipelineReport> {
        let inputs = self.prepare()?;
        let store_credentials = self.credentials.object_store_credentials().await?;
        let uploader = self.uploader(&store_credentials)?;
        let executor = self.executor().await?;

        let staging = &self.config.staging;
        std::fs::create_dir_all(&staging.output_folder_path)?;

        // Split
        let splitter = FileSplitter::from_config(staging)?;
        let mut splits = Vec::with_capacity(inputs.len());
        for (input, dataset) in &inputs {
            info!(dataset = %dataset, "Processing {}", input.display());
            splits.push(splitter.split(input)?);
        }

        // Upload
        let prefix = self.config.aws.key_prefix()?;
        let upload = ParallelUploader::new(uploader, staging.upload_workers)
            .upload_dir(&staging.output_folder_path, &prefix)
            .await?;

        if !upload.is_complete() {
            if staging.fail_on_upload_error {
                return Err(Error::UploadIncomplete {
                    failed: upload.failed.len(),
                    attempted: upload.attempted(),
                });
            }
            warn!(
                failed = upload.failed.len(),
                attempted = upload.attempted(),
                "Continuing to load with incomplete upload"
            );
        }

        // Load
        let settings = LoadSettings::new(&self.config, &store_credentials);
        let load = WarehouseLoader::new(executor, settings)
            .load(&staging.output_folder_path)
            .await?;

        let report = PipelineReport {
            splits,
            upload,
            load,
        };
        info!("{}", report.summary());
        Ok(report)
    }

    /// Injected uploader, or an S3 client for the configured bucket
    fn uploader(&self, credentials: &ObjectStoreCredentials) -> Result<Arc<dyn ObjectUploader>> {
        if let Some(uploader) = &self.uploader {
            return Ok(uploader.clone());
        }
        Ok(Arc::new(ObjectStoreUploader::s3(
            &self.config.aws.s3_bucket_name,
            credentials,
            self.config.aws.endpoint.as_deref(),
        )?))
    }

    /// Injected executor, or a Snowflake connection
    ///
    /// The private key is always loaded and converted, so an unusable key
    /// fails the run even when an executor is injected.
    async fn executor(&self) -> Result<Arc<dyn SqlExecutor>> {
        let key = self.credentials.warehouse_private_key().await?;
        if let Some(executor) = &self.executor {
            return Ok(executor.clone());
        }
        let params = ConnectionParams::from_config(&self.config.snowflake);
        Ok(Arc::new(SnowflakeConnection::connect(params, &key)?))
    }

    /// Validate config and resolve every input to its dataset name
    fn prepare(&self) -> Result<Vec<(PathBuf, DatasetName)>> {
        self.config.validate()?;

        let inputs = discover_inputs(&self.config.staging.input_dataset_path)?;
        let mut seen: HashMap<DatasetName, PathBuf> = HashMap::new();
        let mut resolved = Vec::with_capacity(inputs.len());

        for input in inputs {
            let dataset = DatasetName::from_path(&input)?;
            if let Some(previous) = seen.insert(dataset.clone(), input.clone()) {
                return Err(Error::input(format!(
                    "{} and {} both map to dataset '{dataset}'",
                    previous.display(),
                    input.display()
                )));
            }
            resolved.push((input, dataset));
        }

        info!(inputs = resolved.len(), "Discovered input files");
        Ok(resolved)
    }
}
