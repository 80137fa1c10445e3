//! CLI module
//!
//! Command-line interface for running the pipeline.
//!
//! # Usage
//!
//! - `flakeload <CONFIG>` - Split, upload and load everything the config names

mod commands;
mod runner;

pub use commands::Cli;
pub use runner::Runner;
