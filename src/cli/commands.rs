//! CLI argument parsing

use clap::Parser;
use std::path::PathBuf;

/// Split NDJSON datasets, stage them in S3 and load them into Snowflake
#[derive(Parser, Debug)]
#[command(name = "flakeload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (INI, or YAML by extension)
    pub config: PathBuf,
}
