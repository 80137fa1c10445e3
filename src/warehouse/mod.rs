//! Warehouse module
//!
//! Provisions an external stage and bulk-loads each dataset into Snowflake.
//!
//! # Overview
//!
//! - `SqlExecutor`: the seam between load orchestration and the warehouse
//! - `SnowflakeConnection`: SQL API v2 client with key-pair JWT auth
//! - `statements`: stage/table/copy SQL rendered from templates
//! - `WarehouseLoader`: one stage statement per run, then create + copy per table

mod auth;
mod client;
mod loader;
pub mod statements;

pub use auth::KeyPairAuth;
pub use client::{ConnectionParams, SnowflakeConnection, SqlExecutor, StatementOutcome};
pub use loader::{discover_tables, LoadReport, LoadSettings, WarehouseLoader};
