//! Functional options
//!
//! A [`StorageOption`] is a named mutation of a [`Config`]. Options are
//! applied left to right to a default config, so when two options touch the
//! same field the later one wins. Applying an option never fails; whoever
//! consumes the config validates it.
//!
//! The same option type is used to construct a backend and to tune a single
//! call:
//!
//! ```no_run
//! # async fn demo() -> unistore::Result<()> {
//! use std::time::Duration;
//! use unistore::{new_storage, options, Backend, OperationContext, Storage};
//!
//! let storage = new_storage(
//!     Backend::Gcp,
//!     &[options::gcp_storage(OperationContext::background(), "my-bucket", "/etc/sa.json")],
//! )
//! .await?;
//!
//! let ctx = OperationContext::with_timeout(Duration::from_secs(3));
//! let exists = storage.is_exists("reports/today.csv", &[options::operation_ctx(ctx)]).await?;
//! # let _ = exists;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Backend;
use crate::context::OperationContext;

/// Static access keys for S3-compatible stores
#[derive(Clone, PartialEq, Eq)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Read path tuning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Byte range to read instead of the whole object
    pub range: Option<Range<usize>>,
    /// Only read if the object's ETag matches
    pub if_match: Option<String>,
    /// Only read if the object's ETag differs
    pub if_none_match: Option<String>,
    /// Object version to read, where the store supports versioning
    pub version: Option<String>,
}

/// Write path tuning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Bytes buffered before switching to a multipart upload
    pub buffer_size: Option<usize>,
    /// Concurrent part uploads
    pub max_concurrency: Option<usize>,
    /// Content type; guessed from the path extension when unset
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
}

/// Every knob any backend or call may read.
///
/// Fields a backend does not use are ignored.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub(crate) init_ctx: Option<OperationContext>,
    pub(crate) operation_ctx: Option<OperationContext>,
    pub(crate) secret_path: Option<PathBuf>,
    pub(crate) bucket: Option<String>,
    pub(crate) region: Option<String>,
    pub(crate) endpoint: Option<String>,
    pub(crate) s3_credentials: Option<S3Credentials>,
    pub(crate) reader: HashMap<Backend, ReaderOptions>,
    pub(crate) writer: HashMap<Backend, WriterOptions>,
}

impl Config {
    /// Applies `options` in order to a default config
    pub fn from_options(options: &[StorageOption]) -> Self {
        let mut config = Config::default();
        for option in options {
            option.apply(&mut config);
        }
        config
    }

    /// Context bounding backend construction; unbounded when unset
    pub fn init_ctx(&self) -> OperationContext {
        self.init_ctx.clone().unwrap_or_default()
    }

    /// Context bounding one call; unbounded when unset
    pub fn operation_ctx(&self) -> OperationContext {
        self.operation_ctx.clone().unwrap_or_default()
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub fn secret_path(&self) -> Option<&std::path::Path> {
        self.secret_path.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn s3_credentials(&self) -> Option<&S3Credentials> {
        self.s3_credentials.as_ref()
    }

    /// Reader tuning registered for `backend`
    pub fn reader_options(&self, backend: Backend) -> Option<&ReaderOptions> {
        self.reader.get(&backend)
    }

    /// Writer tuning registered for `backend`
    pub fn writer_options(&self, backend: Backend) -> Option<&WriterOptions> {
        self.writer.get(&backend)
    }
}

/// A named, reusable mutation of a [`Config`]
#[derive(Clone)]
pub struct StorageOption {
    name: &'static str,
    apply: Arc<dyn Fn(&mut Config) + Send + Sync>,
}

impl StorageOption {
    /// Builds an option from a closure. `name` only shows up in `Debug`.
    pub fn new<F>(name: &'static str, apply: F) -> Self
    where
        F: Fn(&mut Config) + Send + Sync + 'static,
    {
        Self {
            name,
            apply: Arc::new(apply),
        }
    }

    pub fn apply(&self, config: &mut Config) {
        (self.apply)(config)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for StorageOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StorageOption").field(&self.name).finish()
    }
}

/// Context used for reading, writing, listing and existence checks
pub fn operation_ctx(ctx: OperationContext) -> StorageOption {
    StorageOption::new("operation_ctx", move |c| {
        c.operation_ctx = Some(ctx.clone());
    })
}

/// Context bounding backend construction, bucket check included
pub fn init_ctx(ctx: OperationContext) -> StorageOption {
    StorageOption::new("init_ctx", move |c| {
        c.init_ctx = Some(ctx.clone());
    })
}

/// Parameters for the Google Cloud Storage backend
pub fn gcp_storage(
    init_ctx: OperationContext,
    bucket: impl Into<String>,
    secret_path: impl Into<PathBuf>,
) -> StorageOption {
    let bucket = bucket.into();
    let secret_path = secret_path.into();
    StorageOption::new("gcp_storage", move |c| {
        c.init_ctx = Some(init_ctx.clone());
        c.bucket = Some(bucket.clone());
        c.secret_path = Some(secret_path.clone());
    })
}

/// Parameters for the S3 backend
pub fn s3_storage(
    init_ctx: OperationContext,
    bucket: impl Into<String>,
    region: impl Into<String>,
) -> StorageOption {
    let bucket = bucket.into();
    let region = region.into();
    StorageOption::new("s3_storage", move |c| {
        c.init_ctx = Some(init_ctx.clone());
        c.bucket = Some(bucket.clone());
        c.region = Some(region.clone());
    })
}

/// Custom endpoint for S3-compatible services such as MinIO
pub fn s3_endpoint(endpoint: impl Into<String>) -> StorageOption {
    let endpoint = endpoint.into();
    StorageOption::new("s3_endpoint", move |c| {
        c.endpoint = Some(endpoint.clone());
    })
}

/// Static S3 credentials instead of the environment credential chain
pub fn s3_credentials(
    access_key_id: impl Into<String>,
    secret_access_key: impl Into<String>,
) -> StorageOption {
    let credentials = S3Credentials {
        access_key_id: access_key_id.into(),
        secret_access_key: secret_access_key.into(),
    };
    StorageOption::new("s3_credentials", move |c| {
        c.s3_credentials = Some(credentials.clone());
    })
}

/// Parameters for the in-memory backend
pub fn memory_storage(init_ctx: OperationContext) -> StorageOption {
    StorageOption::new("memory_storage", move |c| {
        c.init_ctx = Some(init_ctx.clone());
    })
}

/// Reader tuning consumed only by `backend`
pub fn reader_options(backend: Backend, options: ReaderOptions) -> StorageOption {
    StorageOption::new("reader_options", move |c| {
        c.reader.insert(backend, options.clone());
    })
}

/// Writer tuning consumed only by `backend`
pub fn writer_options(backend: Backend, options: WriterOptions) -> StorageOption {
    StorageOption::new("writer_options", move |c| {
        c.writer.insert(backend, options.clone());
    })
}

pub fn gcp_reader_options(options: ReaderOptions) -> StorageOption {
    reader_options(Backend::Gcp, options)
}

pub fn gcp_writer_options(options: WriterOptions) -> StorageOption {
    writer_options(Backend::Gcp, options)
}

pub fn s3_reader_options(options: ReaderOptions) -> StorageOption {
    reader_options(Backend::S3, options)
}

pub fn s3_writer_options(options: WriterOptions) -> StorageOption {
    writer_options(Backend::S3, options)
}
