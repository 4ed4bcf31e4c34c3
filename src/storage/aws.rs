//! AWS S3 storage backend implementation
//!
//! Uses object_store::aws::AmazonS3 with support for:
//! - Explicit credentials (access key ID and secret access key)
//! - The default AWS credential chain when none are given
//! - Custom endpoints for S3-compatible services (MinIO, Ceph, ...)
//!
//! Like the GCS backend, construction checks the bucket before returning.

use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::config::Backend;
use crate::errors::{Result, StorageError};
use crate::options::{Config, StorageOption};
use crate::storage::session::Session;
use crate::storage::{ListQuery, ObjectReader, ObjectWriter, SignedUrlOptions, Storage};

/// AWS S3 storage backend
pub struct S3Storage {
    session: Session<AmazonS3>,
}

impl S3Storage {
    /// Create a new S3 backend
    ///
    /// Bucket and region are required. Without static credentials the
    /// builder falls back to the environment (AWS_ACCESS_KEY_ID, IRSA, EC2
    /// instance metadata, ...).
    pub async fn new(config: &Config) -> Result<Self> {
        let bucket = config
            .bucket()
            .filter(|b| !b.is_empty())
            .ok_or(StorageError::MissingInitParam("bucket"))?;
        let region = config
            .region()
            .filter(|r| !r.is_empty())
            .ok_or(StorageError::MissingInitParam("region"))?;

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region);

        if let Some(credentials) = config.s3_credentials() {
            builder = builder
                .with_access_key_id(&credentials.access_key_id)
                .with_secret_access_key(&credentials.secret_access_key);
        }

        // Configure endpoint (for S3-compatible services like MinIO)
        if let Some(endpoint) = config.endpoint() {
            let url = Url::parse(endpoint).map_err(|e| {
                StorageError::Settings(format!("invalid S3 endpoint {}: {}", endpoint, e))
            })?;
            builder = builder.with_endpoint(endpoint);
            if url.scheme() == "http" {
                builder = builder.with_allow_http(true);
            }
        }

        debug!(%bucket, %region, endpoint = ?config.endpoint(), "building S3 client");
        let store = builder.build()?;

        let session = Session::new(Backend::S3, bucket, Arc::new(store));
        session.check_bucket(config).await?;

        info!(%bucket, %region, "S3 backend ready");
        Ok(Self { session })
    }

    pub fn bucket(&self) -> &str {
        self.session.bucket()
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn write(&self, path: &str, options: &[StorageOption]) -> Result<ObjectWriter> {
        self.session.write(path, options).await
    }

    async fn read(&self, path: &str, options: &[StorageOption]) -> Result<ObjectReader> {
        self.session.read(path, options).await
    }

    async fn close(&self) -> Result<()> {
        self.session.close().await
    }

    async fn is_exists(&self, path: &str, options: &[StorageOption]) -> Result<bool> {
        self.session.is_exists(path, options).await
    }

    async fn get_signed_url(&self, path: &str, opts: Option<&SignedUrlOptions>) -> Result<String> {
        self.session.signed_url(path, opts).await
    }

    async fn list_object(&self, query: &ListQuery, options: &[StorageOption]) -> Result<Vec<String>> {
        self.session.list_object(query, options).await
    }
}
