// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # flakeload
//!
//! Bulk-load newline-delimited JSON datasets into Snowflake through an
//! S3 external stage.
//!
//! ## Features
//!
//! - **Splitting**: Partition each NDJSON file into fixed-size JSON array batches
//! - **Parallel Upload**: Mirror the batch tree into S3 with a bounded worker pool
//! - **Warehouse Load**: One external stage, then `CREATE TABLE` + `COPY INTO` per dataset
//! - **Key-Pair Auth**: Snowflake SQL API with RS256 JWTs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flakeload::config::PipelineConfig;
//! use flakeload::credentials::ConfigCredentialProvider;
//! use flakeload::pipeline::Pipeline;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> flakeload::Result<()> {
//!     let config = PipelineConfig::from_file("config.ini")?;
//!     let credentials = Arc::new(ConfigCredentialProvider::new(config.clone()));
//!     let report = Pipeline::new(config, credentials).run().await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         Pipeline                           │
//! │   validate → split (per file) → upload (tree) → load       │
//! └────────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────┬──────────────┬───┴──────────┬───────────────────┐
//! │  Config  │   Split      │   Upload     │   Warehouse       │
//! ├──────────┼──────────────┼──────────────┼───────────────────┤
//! │ INI/YAML │ Read NDJSON  │ object_store │ SQL API v2        │
//! │ Validate │ Batch        │ Worker pool  │ JWT key-pair auth │
//! │          │ Write arrays │ Report       │ Stage/Table/Copy  │
//! └──────────┴──────────────┴──────────────┴───────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Pipeline configuration (INI / YAML)
pub mod config;

/// Object store and warehouse credentials
pub mod credentials;

/// Template interpolation for SQL statements
pub mod template;

/// NDJSON splitting into batch files
pub mod split;

/// Parallel upload to object storage
pub mod upload;

/// Snowflake stage and table loading
pub mod warehouse;

/// End-to-end orchestration
pub mod pipeline;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use pipeline::{Pipeline, PipelineReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
