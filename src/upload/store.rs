//! Object store upload support (S3, S3-compatible, local)

use crate::credentials::ObjectStoreCredentials;
use crate::error::{Error, Result};
use crate::types::RemoteKey;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use secrecy::ExposeSecret;
use std::path::Path;
use std::sync::Arc;

/// Uploads one local file to a remote key
#[async_trait]
pub trait ObjectUploader: Send + Sync {
    /// Upload `local_path` to `key`, overwriting any existing object
    async fn upload(&self, local_path: &Path, key: &RemoteKey) -> Result<()>;

    /// Human-readable destination for log lines
    fn destination(&self) -> String;
}

/// `ObjectUploader` backed by an `object_store` implementation
#[derive(Debug, Clone)]
pub struct ObjectStoreUploader {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// URL scheme for logging
    scheme: String,
    /// Bucket or directory name for logging
    location: String,
}

impl ObjectStoreUploader {
    /// Wrap an existing store
    pub fn new(
        store: Arc<dyn ObjectStore>,
        scheme: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            store,
            scheme: scheme.into(),
            location: location.into(),
        }
    }

    /// S3 (or S3-compatible) bucket with explicit credentials
    pub fn s3(
        bucket: &str,
        credentials: &ObjectStoreCredentials,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&credentials.region)
            .with_access_key_id(&credentials.access_key_id)
            .with_secret_access_key(credentials.secret_access_key.expose_secret());

        if let Some(endpoint) = endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| Error::connection(format!("Failed to create s3 client: {e}")))?;

        Ok(Self::new(Arc::new(store), "s3", bucket))
    }

    /// Local directory standing in for a bucket
    pub fn local(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::config(format!("Failed to create directory {}: {e}", dir.display()))
        })?;

        let store = LocalFileSystem::new_with_prefix(dir)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;

        Ok(Self::new(
            Arc::new(store),
            "file",
            dir.display().to_string(),
        ))
    }

    /// Get the scheme (s3, file)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }
}

#[async_trait]
impl ObjectUploader for ObjectStoreUploader {
    async fn upload(&self, local_path: &Path, key: &RemoteKey) -> Result<()> {
        let data = tokio::fs::read(local_path).await.map_err(|e| {
            Error::upload(
                key.as_str(),
                format!("Failed to read {}: {e}", local_path.display()),
            )
        })?;

        let path = ObjectPath::from(key.as_str());
        self.store
            .put(&path, Bytes::from(data).into())
            .await
            .map_err(|e| Error::upload(key.as_str(), e.to_string()))?;

        Ok(())
    }

    fn destination(&self) -> String {
        format!("{}://{}", self.scheme, self.location)
    }
}
