//! Storage backend abstraction layer
//!
//! Provides a unified interface over different object storage backends
//! (Google Cloud Storage, AWS S3, in-memory) using the object_store crate.
//! Every backend is constructed through [`new_storage`] and used through the
//! [`Storage`] trait, so callers can switch providers by changing the
//! [`Backend`] selector and the init options only.

#[cfg(feature = "aws")]
pub mod aws;
#[cfg(feature = "gcp")]
pub mod gcp;
mod handles;
pub mod memory;
mod session;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::Backend;
use crate::errors::{Result, StorageError};
use crate::options::{Config, StorageOption};

#[cfg(feature = "aws")]
pub use aws::S3Storage;
#[cfg(feature = "gcp")]
pub use gcp::{AccountInfo, GcpStorage};
pub use handles::{ObjectReader, ObjectWriter};
pub use memory::MemoryStorage;

/// Request for a signed URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrlOptions {
    /// HTTP method the URL will be used with
    pub method: http::Method,
    /// Expected content type. The delegated signers only sign the host
    /// header, so this is not bound into the signature.
    pub content_type: Option<String>,
    /// Instant after which the URL stops working
    pub expires_at: DateTime<Utc>,
}

impl SignedUrlOptions {
    pub fn new(method: http::Method, expires_at: DateTime<Utc>) -> Self {
        Self {
            method,
            content_type: None,
            expires_at,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Time left until expiry; an expiry not in the future is rejected
    pub(crate) fn expires_in(&self) -> Result<Duration> {
        (self.expires_at - Utc::now())
            .to_std()
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                StorageError::InvalidSignedUrlOptions(format!(
                    "expiry time {} is not in the future",
                    self.expires_at
                ))
            })
    }
}

/// Filter for [`Storage::list_object`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Only names starting with this string
    pub prefix: String,
    /// When non-empty, names with the delimiter after the prefix are
    /// collapsed into `prefix + segment + delimiter`
    pub delimiter: String,
}

impl ListQuery {
    pub fn new(prefix: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: delimiter.into(),
        }
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::new(prefix, "")
    }
}

/// Storage trait for unified object storage operations
///
/// All storage operations flow through this trait, which abstracts over
/// the different providers. Implementations delegate to object_store and
/// pass provider errors through unchanged.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Opens a writer for `path`. The object is committed when the writer
    /// is shut down.
    async fn write(&self, path: &str, options: &[StorageOption]) -> Result<ObjectWriter>;

    /// Opens a reader for `path`
    async fn read(&self, path: &str, options: &[StorageOption]) -> Result<ObjectReader>;

    /// Releases the session. Calling it again is a no-op; afterwards every
    /// other operation fails with [`StorageError::Closed`].
    async fn close(&self) -> Result<()>;

    /// Checks whether `path` exists
    async fn is_exists(&self, path: &str, options: &[StorageOption]) -> Result<bool>;

    /// Returns a URL granting time-limited access to `path` without further
    /// authentication. `None` options are rejected.
    async fn get_signed_url(&self, path: &str, opts: Option<&SignedUrlOptions>) -> Result<String>;

    /// Returns the names of the objects matching `query`.
    ///
    /// The listing is drained completely; an error part way through discards
    /// what was collected.
    async fn list_object(&self, query: &ListQuery, options: &[StorageOption]) -> Result<Vec<String>>;
}

/// Create a storage backend from options
///
/// The backend loads its credentials and checks its bucket before this
/// returns; on any failure no handle is returned.
pub async fn new_storage(backend: Backend, options: &[StorageOption]) -> Result<Arc<dyn Storage>> {
    let config = Config::from_options(options);

    let storage: Arc<dyn Storage> = match backend {
        #[cfg(feature = "gcp")]
        Backend::Gcp => Arc::new(GcpStorage::new(&config).await?),
        #[cfg(feature = "aws")]
        Backend::S3 => Arc::new(S3Storage::new(&config).await?),
        Backend::Memory => Arc::new(MemoryStorage::new(&config).await?),
        #[allow(unreachable_patterns)]
        other => return Err(StorageError::ImplementationNotFound(other.to_string())),
    };

    info!(%backend, "storage backend initialized");
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_in_past_is_rejected() {
        let opts = SignedUrlOptions::new(http::Method::GET, Utc::now() - chrono::Duration::minutes(1));
        assert!(matches!(
            opts.expires_in(),
            Err(StorageError::InvalidSignedUrlOptions(_))
        ));
    }

    #[test]
    fn test_expiry_in_future() {
        let opts = SignedUrlOptions::new(http::Method::PUT, Utc::now() + chrono::Duration::minutes(10))
            .with_content_type("text/plain");
        let left = opts.expires_in().unwrap();
        assert!(left > Duration::from_secs(9 * 60));
        assert!(left <= Duration::from_secs(10 * 60));
        assert_eq!(opts.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_list_query_constructors() {
        assert_eq!(ListQuery::prefix("a/"), ListQuery::new("a/", ""));
        assert_eq!(ListQuery::default().prefix, "");
    }
}
