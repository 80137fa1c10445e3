//! Credential providers

use super::types::{pem_to_pkcs8_der, ObjectStoreCredentials, PrivateKeyDer};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Source of the secrets the pipeline needs
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Keys for the object store client
    async fn object_store_credentials(&self) -> Result<ObjectStoreCredentials>;

    /// Warehouse private key as unencrypted PKCS#8 DER
    async fn warehouse_private_key(&self) -> Result<PrivateKeyDer>;
}

/// Read a PEM file and convert it to DER
async fn read_pem_file(path: &Path) -> Result<PrivateKeyDer> {
    let pem = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::credential(format!(
            "Failed to read private key {}: {e}",
            path.display()
        ))
    })?;
    debug!(path = %path.display(), "Loaded warehouse private key");
    pem_to_pkcs8_der(&pem)
}

// ============================================================================
// Config file provider
// ============================================================================

/// Reads credentials from the `AWS` and `SNOWFLAKE` config sections
#[derive(Debug, Clone)]
pub struct ConfigCredentialProvider {
    config: PipelineConfig,
}

impl ConfigCredentialProvider {
    /// Create a provider over a loaded configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CredentialProvider for ConfigCredentialProvider {
    async fn object_store_credentials(&self) -> Result<ObjectStoreCredentials> {
        let aws = &self.config.aws;
        Ok(ObjectStoreCredentials {
            access_key_id: aws.aws_access_key_id.clone(),
            secret_access_key: aws.aws_secret_access_key.clone(),
            region: aws.aws_region.clone(),
        })
    }

    async fn warehouse_private_key(&self) -> Result<PrivateKeyDer> {
        read_pem_file(&self.config.snowflake.private_key_file_path).await
    }
}

// ============================================================================
// Environment provider
// ============================================================================

/// Reads credentials from environment variables
///
/// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`
/// - `SNOWFLAKE_PRIVATE_KEY` (inline PEM) or `SNOWFLAKE_PRIVATE_KEY_PATH`
#[derive(Clone, Default)]
pub struct EnvCredentialProvider {
    vars: HashMap<String, String>,
}

impl EnvCredentialProvider {
    /// Snapshot the process environment
    pub fn new() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from an explicit set of variables
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: vars.into_iter().collect(),
        }
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<&str> {
        self.var(name)
            .ok_or_else(|| Error::credential(format!("Environment variable {name} is not set")))
    }
}

impl std::fmt::Debug for EnvCredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCredentialProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn object_store_credentials(&self) -> Result<ObjectStoreCredentials> {
        Ok(ObjectStoreCredentials {
            access_key_id: self.required("AWS_ACCESS_KEY_ID")?.to_string(),
            secret_access_key: SecretString::from(
                self.required("AWS_SECRET_ACCESS_KEY")?.to_string(),
            ),
            region: self.required("AWS_REGION")?.to_string(),
        })
    }

    async fn warehouse_private_key(&self) -> Result<PrivateKeyDer> {
        if let Some(pem) = self.var("SNOWFLAKE_PRIVATE_KEY") {
            return pem_to_pkcs8_der(pem);
        }
        let path = self.required("SNOWFLAKE_PRIVATE_KEY_PATH")?;
        read_pem_file(Path::new(path)).await
    }
}
