//! CLI runner - executes the pipeline

use crate::cli::commands::Cli;
use crate::config::PipelineConfig;
use crate::credentials::ConfigCredentialProvider;
use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineReport};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Load the configuration once and run every stage
    pub async fn run(&self) -> Result<PipelineReport> {
        let start = Instant::now();
        let config = PipelineConfig::from_file(&self.cli.config)?;
        info!(config = %self.cli.config.display(), "Loaded configuration");

        let credentials = Arc::new(ConfigCredentialProvider::new(config.clone()));
        let report = Pipeline::new(config, credentials).run().await?;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline finished"
        );
        Ok(report)
    }
}
