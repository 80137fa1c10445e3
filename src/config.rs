//! Pipeline configuration
//!
//! This module contains the settings record used by every pipeline stage.
//! It is loaded once from an INI file with `STAGING`, `AWS` and `SNOWFLAKE`
//! sections (or the equivalent YAML document) and passed around explicitly.

use crate::error::{Error, Result};
use ini::{Ini, ParseOption, Properties};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default number of concurrent uploads
pub const DEFAULT_UPLOAD_WORKERS: usize = 10;

/// Default stage name created inside `<database>.<schema>`
pub const DEFAULT_STAGE_NAME: &str = "S3_STAGE";

/// Default server-side statement timeout
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 3600;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Local staging settings
    pub staging: StagingConfig,

    /// Object store settings
    pub aws: AwsConfig,

    /// Warehouse settings
    pub snowflake: SnowflakeConfig,
}

// ============================================================================
// Staging
// ============================================================================

/// Local input/output settings
#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    /// Directory holding the raw newline-delimited JSON files
    pub input_dataset_path: PathBuf,

    /// Root directory for the split batch files
    pub output_folder_path: PathBuf,

    /// Maximum records per batch file
    pub no_of_lines: usize,

    /// Concurrent upload workers
    #[serde(default = "default_upload_workers")]
    pub upload_workers: usize,

    /// Abort before loading when any upload failed
    #[serde(default)]
    pub fail_on_upload_error: bool,
}

fn default_upload_workers() -> usize {
    DEFAULT_UPLOAD_WORKERS
}

// ============================================================================
// AWS
// ============================================================================

/// Object store credentials and destination
#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    /// Access key id
    pub aws_access_key_id: String,

    /// Secret access key
    pub aws_secret_access_key: SecretString,

    /// Region of the bucket
    pub aws_region: String,

    /// Destination bucket
    pub s3_bucket_name: String,

    /// Full destination URL, e.g. `s3://my-bucket/dataset/`
    pub s3_bucket_path: String,

    /// Custom endpoint for S3-compatible stores
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl AwsConfig {
    /// Split `s3_bucket_path` into `(bucket, prefix)`
    fn parse_bucket_path(&self) -> Result<(&str, &str)> {
        let without_scheme = self.s3_bucket_path.strip_prefix("s3://").ok_or_else(|| {
            Error::invalid_value(
                "AWS.s3_bucket_path",
                format!("expected s3://bucket/prefix, got '{}'", self.s3_bucket_path),
            )
        })?;

        let (bucket, prefix) = match without_scheme.find('/') {
            Some(idx) => (&without_scheme[..idx], &without_scheme[idx + 1..]),
            None => (without_scheme, ""),
        };

        if bucket.is_empty() {
            return Err(Error::invalid_value(
                "AWS.s3_bucket_path",
                "bucket name is empty",
            ));
        }

        Ok((bucket, prefix.trim_matches('/')))
    }

    /// Key prefix inside the bucket (`s3://b/dataset/` -> `dataset`)
    pub fn key_prefix(&self) -> Result<String> {
        self.parse_bucket_path().map(|(_, prefix)| prefix.to_string())
    }

    /// Stage URL with any trailing slash removed
    pub fn stage_url(&self) -> &str {
        self.s3_bucket_path.trim_end_matches('/')
    }
}

// ============================================================================
// Snowflake
// ============================================================================

/// Warehouse connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeConfig {
    /// Account identifier, e.g. `myorg-account123`
    pub account: String,

    /// Login name
    pub user: String,

    /// Role used for all statements
    pub role: String,

    /// Virtual warehouse
    pub warehouse: String,

    /// Database holding the raw tables
    pub raw_database: String,

    /// Schema holding the raw tables
    pub raw_schema: String,

    /// PEM private key for key-pair auth
    pub private_key_file_path: PathBuf,

    /// External stage name
    #[serde(default = "default_stage_name")]
    pub stage_name: String,

    /// Override for the SQL API host
    #[serde(default)]
    pub base_url: Option<String>,

    /// Statement timeout passed to the warehouse
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: u64,
}

fn default_stage_name() -> String {
    DEFAULT_STAGE_NAME.to_string()
}

fn default_statement_timeout_secs() -> u64 {
    DEFAULT_STATEMENT_TIMEOUT_SECS
}

impl SnowflakeConfig {
    /// SQL API base URL
    pub fn api_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.snowflakecomputing.com",
                self.account.to_lowercase()
            ),
        }
    }

    /// Statement timeout as a duration
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }
}

// ============================================================================
// Loading
// ============================================================================

impl PipelineConfig {
    /// Load configuration from a file
    ///
    /// `.yaml`/`.yml` files are read as YAML, everything else as INI.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        let config = if is_yaml {
            Self::from_yaml_str(&content)?
        } else {
            Self::from_ini_str(&content)?
        };

        tracing::debug!(path = %path.display(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Parse a YAML document with `staging`, `aws` and `snowflake` keys
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.check_values()?;
        Ok(config)
    }

    /// Parse an INI document with `STAGING`, `AWS` and `SNOWFLAKE` sections
    pub fn from_ini_str(content: &str) -> Result<Self> {
        let opt = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(content, opt)?;

        let staging = Section::get(&ini, "STAGING")?;
        let aws = Section::get(&ini, "AWS")?;
        let snowflake = Section::get(&ini, "SNOWFLAKE")?;

        let config = Self {
            staging: StagingConfig {
                input_dataset_path: staging.required("input_dataset_path")?.into(),
                output_folder_path: staging.required("output_folder_path")?.into(),
                no_of_lines: staging.required_int("no_of_lines")?,
                upload_workers: staging
                    .optional_int("upload_workers")?
                    .unwrap_or(DEFAULT_UPLOAD_WORKERS),
                fail_on_upload_error: staging
                    .optional_bool("fail_on_upload_error")?
                    .unwrap_or(false),
            },
            aws: AwsConfig {
                aws_access_key_id: aws.required("aws_access_key_id")?.to_string(),
                aws_secret_access_key: SecretString::from(
                    aws.required("aws_secret_access_key")?.to_string(),
                ),
                aws_region: aws.required("aws_region")?.to_string(),
                s3_bucket_name: aws.required("s3_bucket_name")?.to_string(),
                s3_bucket_path: aws.required("s3_bucket_path")?.to_string(),
                endpoint: aws.optional("endpoint").map(String::from),
            },
            snowflake: SnowflakeConfig {
                account: snowflake.required("account")?.to_string(),
                user: snowflake.required("user")?.to_string(),
                role: snowflake.required("role")?.to_string(),
                warehouse: snowflake.required("warehouse")?.to_string(),
                raw_database: snowflake.required("raw_database")?.to_string(),
                raw_schema: snowflake.required("raw_schema")?.to_string(),
                private_key_file_path: snowflake.required("private_key_file_path")?.into(),
                stage_name: snowflake
                    .optional("stage_name")
                    .map_or_else(default_stage_name, String::from),
                base_url: snowflake.optional("base_url").map(String::from),
                statement_timeout_secs: snowflake
                    .optional_int("statement_timeout_secs")?
                    .map_or(DEFAULT_STATEMENT_TIMEOUT_SECS, |v| v as u64),
            },
        };

        config.check_values()?;
        Ok(config)
    }

    /// Value checks that need no filesystem access
    fn check_values(&self) -> Result<()> {
        if self.staging.no_of_lines == 0 {
            return Err(Error::invalid_value(
                "STAGING.no_of_lines",
                "must be a positive integer",
            ));
        }
        if self.staging.upload_workers == 0 {
            return Err(Error::invalid_value(
                "STAGING.upload_workers",
                "must be a positive integer",
            ));
        }
        self.aws.parse_bucket_path()?;

        for (field, value) in [
            ("AWS.endpoint", &self.aws.endpoint),
            ("SNOWFLAKE.base_url", &self.snowflake.base_url),
        ] {
            if let Some(value) = value {
                Url::parse(value).map_err(|e| Error::invalid_value(field, e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Check that every referenced path resolves
    ///
    /// Called by the pipeline before any I/O side effect.
    pub fn validate(&self) -> Result<()> {
        self.check_values()?;

        let input = &self.staging.input_dataset_path;
        if !input.is_dir() {
            return Err(Error::invalid_value(
                "STAGING.input_dataset_path",
                format!("{} is not a directory", input.display()),
            ));
        }

        let key = &self.snowflake.private_key_file_path;
        if !key.is_file() {
            return Err(Error::invalid_value(
                "SNOWFLAKE.private_key_file_path",
                format!("{} does not exist", key.display()),
            ));
        }

        Ok(())
    }
}

/// Named INI section with case-insensitive key lookup
struct Section<'a> {
    name: &'static str,
    props: &'a Properties,
}

impl<'a> Section<'a> {
    fn get(ini: &'a Ini, name: &'static str) -> Result<Self> {
        let props = ini
            .section(Some(name))
            .ok_or_else(|| Error::missing_field(name))?;
        Ok(Self { name, props })
    }

    fn optional(&self, key: &str) -> Option<&'a str> {
        self.props
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.trim())
    }

    fn required(&self, key: &str) -> Result<&'a str> {
        self.optional(key)
            .ok_or_else(|| Error::missing_field(format!("{}.{key}", self.name)))
    }

    fn parse_int(&self, key: &str, value: &str) -> Result<usize> {
        value.parse::<usize>().map_err(|e| {
            Error::invalid_value(
                format!("{}.{key}", self.name),
                format!("'{value}' is not an integer: {e}"),
            )
        })
    }

    fn required_int(&self, key: &str) -> Result<usize> {
        let value = self.required(key)?;
        self.parse_int(key, value)
    }

    fn optional_int(&self, key: &str) -> Result<Option<usize>> {
        self.optional(key)
            .map(|value| self.parse_int(key, value))
            .transpose()
    }

    fn optional_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(value) = self.optional(key) else {
            return Ok(None);
        };
        match value.to_ascii_lowercase().as_str() {
            "1" | "yes" | "true" | "on" => Ok(Some(true)),
            "0" | "no" | "false" | "off" => Ok(Some(false)),
            _ => Err(Error::invalid_value(
                format!("{}.{key}", self.name),
                format!("'{value}' is not a boolean"),
            )),
        }
    }
}
