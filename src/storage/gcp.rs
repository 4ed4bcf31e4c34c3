//! Google Cloud Storage backend implementation
//!
//! Uses object_store::gcp::GoogleCloudStorage authenticated with a service
//! account JSON key file. Construction runs in this order, and any failure
//! stops it without returning a backend:
//! 1. read the key file
//! 2. parse `private_key` and `client_email` out of it
//! 3. build the client from the same key
//! 4. check the bucket is reachable
//!
//! Token exchange and URL signing are left to object_store, which keeps its
//! own token source derived from the key.

use async_trait::async_trait;
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::ClientOptions;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::config::Backend;
use crate::errors::{Result, StorageError};
use crate::options::{Config, StorageOption};
use crate::storage::session::Session;
use crate::storage::{ListQuery, ObjectReader, ObjectWriter, SignedUrlOptions, Storage};

/// The service account fields this backend needs
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub client_email: String,
    /// Storage endpoint override, as used by GCS emulators
    #[serde(default)]
    pub gcs_base_url: Option<String>,
}

impl AccountInfo {
    /// Parses a service account document; other fields are ignored
    pub fn from_json(raw: &str) -> Result<Self> {
        let info: AccountInfo = serde_json::from_str(raw).map_err(StorageError::SecretParse)?;
        if info.private_key.trim().is_empty() {
            return Err(StorageError::MissingCredential("private_key"));
        }
        if info.client_email.trim().is_empty() {
            return Err(StorageError::MissingCredential("client_email"));
        }
        Ok(info)
    }
}

impl fmt::Debug for AccountInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountInfo")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("gcs_base_url", &self.gcs_base_url)
            .finish()
    }
}

/// Google Cloud Storage backend
pub struct GcpStorage {
    session: Session<GoogleCloudStorage>,
    account: AccountInfo,
}

impl GcpStorage {
    /// Create a new GCP Cloud Storage backend
    ///
    /// Reads the bucket, secret path and init context from `config`.
    pub async fn new(config: &Config) -> Result<Self> {
        let bucket = config
            .bucket()
            .filter(|b| !b.is_empty())
            .ok_or(StorageError::MissingInitParam("bucket"))?;
        let secret_path = config
            .secret_path()
            .ok_or(StorageError::MissingInitParam("secret_path"))?;
        let init_ctx = config.init_ctx();

        debug!(path = %secret_path.display(), "loading service account key");
        let raw = init_ctx
            .run(tokio::fs::read_to_string(secret_path))
            .await?
            .map_err(|source| StorageError::SecretRead {
                path: secret_path.to_path_buf(),
                source,
            })?;
        let account = AccountInfo::from_json(&raw)?;

        let mut builder = GoogleCloudStorageBuilder::new()
            .with_bucket_name(bucket)
            .with_service_account_key(&raw);

        // Endpoint overrides point at emulators, which often serve plain HTTP
        if let Some(base_url) = &account.gcs_base_url {
            let url = Url::parse(base_url).map_err(|e| {
                StorageError::Settings(format!("invalid GCS base URL {}: {}", base_url, e))
            })?;
            if url.scheme() == "http" {
                builder = builder.with_client_options(ClientOptions::new().with_allow_http(true));
            }
        }

        debug!(client_email = %account.client_email, %bucket, base_url = ?account.gcs_base_url, "building GCS client");
        let store = builder.build()?;

        let session = Session::new(Backend::Gcp, bucket, Arc::new(store));
        session.check_bucket(config).await?;

        info!(client_email = %account.client_email, %bucket, "GCS backend ready");
        Ok(Self { session, account })
    }

    /// Service account loaded at construction
    pub fn account(&self) -> &AccountInfo {
        &self.account
    }

    pub fn bucket(&self) -> &str {
        self.session.bucket()
    }
}

#[async_trait]
impl Storage for GcpStorage {
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
