//! Upload module
//!
//! Mirrors a local directory tree into object storage.
//!
//! # Overview
//!
//! - Enumerating local files and mapping them to remote keys
//! - The `ObjectUploader` trait and its `object_store` implementation
//! - A bounded parallel runner that isolates per-file failures and
//!   returns an aggregate `UploadReport`

mod parallel;
mod store;

pub use parallel::{
    collect_upload_tasks, remote_key, ParallelUploader, UploadFailure, UploadReport, UploadTask,
};
pub use store::{ObjectStoreUploader, ObjectUploader};

#[cfg(test)]
mod tests;
