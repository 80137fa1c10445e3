//! Warehouse load orchestration

use super::client::SqlExecutor;
use super::statements;
use crate::config::PipelineConfig;
use crate::credentials::ObjectStoreCredentials;
use crate::error::{Error, Result};
use crate::types::DatasetName;
use secrecy::SecretString;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the load statements need
#[derive(Debug, Clone)]
pub struct LoadSettings {
    /// Target database
    pub database: String,
    /// Target schema
    pub schema: String,
    /// Unqualified stage name
    pub stage_name: String,
    /// Object store URL the stage points at
    pub stage_url: String,
    /// Access key embedded in the stage
    pub aws_key_id: String,
    /// Secret key embedded in the stage
    pub aws_secret_key: SecretString,
}

impl LoadSettings {
    /// Build from config plus the object store credentials
    pub fn new(config: &PipelineConfig, credentials: &ObjectStoreCredentials) -> Self {
        Self {
            database: config.snowflake.raw_database.clone(),
            schema: config.snowflake.raw_schema.clone(),
            stage_name: config.snowflake.stage_name.clone(),
            stage_url: config.aws.stage_url().to_string(),
            aws_key_id: credentials.access_key_id.clone(),
            aws_secret_key: credentials.secret_access_key.clone(),
        }
    }

    /// `<database>.<schema>.<stage>`
    pub fn qualified_stage(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.stage_name)
    }

    /// `<database>.<schema>.<dataset>`
    pub fn qualified_table(&self, dataset: &DatasetName) -> String {
        format!("{}.{}.{dataset}", self.database, self.schema)
    }
}

/// Outcome of a load run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Fully qualified stage name
    pub stage: String,
    /// Tables created (if absent) and loaded, in load order
    pub tables: Vec<DatasetName>,
}

/// Find every directory below `local_root` holding at least one `.json` file
///
/// The directory's base name is the table name. The root itself never counts.
pub fn discover_tables(local_root: impl AsRef<Path>) -> Result<Vec<DatasetName>> {
    let local_root = local_root.as_ref();
    let mut tables = BTreeSet::new();
    let mut pending = vec![local_root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut has_json = false;
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                pending.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
                has_json = true;
            }
        }

        if has_json && dir != local_root {
            let name = dir
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| Error::input(format!("Invalid directory name: {}", dir.display())))?;
            tables.insert(DatasetName::new(name)?);
        }
    }

    Ok(tables.into_iter().collect())
}

/// Creates the stage, then creates and loads one table per dataset
pub struct WarehouseLoader {
    executor: Arc<dyn SqlExecutor>,
    settings: LoadSettings,
}

impl WarehouseLoader {
    /// Create a loader over an open connection
    pub fn new(executor: Arc<dyn SqlExecutor>, settings: LoadSettings) -> Self {
        Self { executor, settings }
    }

    /// Load every dataset directory under `local_root`
    ///
    /// The connection is closed whether or not the load succeeds. The first
    /// failing statement aborts the run; tables already loaded stay loaded.
    pub async fn load(&self, local_root: impl AsRef<Path>) -> Result<LoadReport> {
        let result = match discover_tables(local_root) {
            Ok(tables) => self.load_tables(&tables).await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.executor.close().await {
            warn!("Failed to close warehouse connection: {e}");
        }

        result
    }

    /// Create the stage and load the given tables
    pub async fn load_tables(&self, tables: &[DatasetName]) -> Result<LoadReport> {
        let stage = self.settings.qualified_stage();

        self.executor
            .execute(&statements::create_stage(&self.settings)?)
            .await?;
        info!("Stage {stage} is ready.");

        for table in tables {
            self.executor
                .execute(&statements::create_table(&self.settings, table)?)
                .await?;
            info!("Table {table} is ready.");

            let outcome = self
                .executor
                .execute(&statements::copy_into(&self.settings, table)?)
                .await?;
            info!(
                rows = outcome.rows.len(),
                "Data from @{stage}/{table}/ loaded into {table}."
            );
        }

        info!("Data load process completed.");
        Ok(LoadReport {
            stage,
            tables: tables.to_vec(),
        })
    }
}
