//! Common types used throughout flakeload
//!
//! Value types shared by the splitter, uploader and warehouse loader.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Unquoted SQL identifier: the dataset name doubles as a table name
static IDENTIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").unwrap());

/// Check whether a string can be used as an unquoted SQL identifier
pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER_REGEX.is_match(s)
}

// ============================================================================
// Dataset
// ============================================================================

/// Short dataset name derived from an input file name
///
/// Used as the output subdirectory, the object key segment and the
/// destination table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetName(String);

impl DatasetName {
    /// Create a dataset name, validating it as a SQL identifier
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(Error::input(format!(
                "Dataset name '{name}' is not a valid table identifier"
            )));
        }
        Ok(Self(name))
    }

    /// Derive the dataset name from a file path
    ///
    /// Takes the file stem (extension stripped) and keeps the last
    /// `_`-delimited token: `yelp_academic_dataset_business.json` -> `business`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::input(format!("Invalid input file name: {}", path.display())))?;

        let token = stem.rsplit('_').next().unwrap_or(stem);
        Self::new(token)
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DatasetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Batch File
// ============================================================================

/// One split output file holding a JSON array of records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFile {
    /// Dataset this batch belongs to
    pub dataset: DatasetName,
    /// Number of records in the batch
    pub records: usize,
    /// 1-based position of the batch within the dataset
    pub sequence: usize,
    /// Where the batch was written
    pub path: PathBuf,
}

impl BatchFile {
    /// Deterministic file name: `{dataset}_{records}_part_{sequence}.json`
    pub fn file_name(dataset: &DatasetName, records: usize, sequence: usize) -> String {
        format!("{dataset}_{records}_part_{sequence}.json")
    }
}

// ============================================================================
// Remote Object
// ============================================================================

/// Object store key: `prefix/relative/path`, `/`-separated, no leading slash
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteKey(String);

impl RemoteKey {
    /// Build a key from a prefix and a relative path
    pub fn new(prefix: &str, relative: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        let relative = relative.trim_start_matches('/');
        if prefix.is_empty() {
            Self(relative.to_string())
        } else {
            Self(format!("{prefix}/{relative}"))
        }
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
