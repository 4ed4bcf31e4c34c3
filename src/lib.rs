//! unistore - one storage interface over cloud object stores
//!
//! Callers pick a [`Backend`], pass init options to [`new_storage`] and get
//! back an `Arc<dyn Storage>`. Every operation takes its own options, most
//! importantly an [`OperationContext`] bounding the call, plus
//! backend-specific reader / writer tuning that other backends ignore.
//!
//! Transport, authentication, retries and URL signing are done by the
//! object_store crate; this crate only selects, configures and delegates.
//!
//! ```no_run
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//! use unistore::{new_storage, options, Backend, OperationContext, Storage};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = new_storage(
//!     Backend::Gcp,
//!     &[options::gcp_storage(OperationContext::background(), "my-bucket", "/etc/sa.json")],
//! )
//! .await?;
//!
//! let mut writer = storage.write("test/key1", &[]).await?;
//! writer.write_all(b"abc").await?;
//! writer.shutdown().await?;
//!
//! let mut body = Vec::new();
//! storage.read("test/key1", &[]).await?.read_to_end(&mut body).await?;
//! assert_eq!(body, b"abc");
//!
//! storage.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod errors;
pub mod metrics;
pub mod options;
pub mod storage;

pub use config::{Backend, Settings};
pub use context::OperationContext;
pub use errors::{Result, StorageError};
pub use options::{Config, ReaderOptions, StorageOption, WriterOptions};
pub use storage::{
    new_storage, ListQuery, ObjectReader, ObjectWriter, SignedUrlOptions, Storage,
};
pub use tokio_util::sync::CancellationToken;
