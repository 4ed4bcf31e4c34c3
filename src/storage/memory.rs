//! In-memory storage backend
//!
//! Backed by object_store's `InMemory`. Every instance starts empty and its
//! contents live as long as the instance. Useful for local development and
//! tests; it cannot sign URLs.

use async_trait::async_trait;
use object_store::memory::InMemory;
use std::sync::Arc;
use tracing::debug;

use crate::config::Backend;
use crate::errors::{Result, StorageError};
use crate::options::{Config, StorageOption};
use crate::storage::session::Session;
use crate::storage::{ListQuery, ObjectReader, ObjectWriter, SignedUrlOptions, Storage};

const BUCKET: &str = "memory";

/// In-memory storage backend
pub struct MemoryStorage {
    session: Session<InMemory>,
}

impl MemoryStorage {
    /// Create an empty in-memory store. Only the init context is read: an
    /// already expired one fails construction like any other backend.
    pub async fn new(config: &Config) -> Result<Self> {
        if let Some(err) = config.init_ctx().err() {
            return Err(err);
        }

        let bucket = config.bucket().unwrap_or(BUCKET).to_string();
        debug!(%bucket, "opening in-memory store");

        Ok(Self {
            session: Session::new(Backend::Memory, bucket, Arc::new(InMemory::new())),
        })
    }

    pub fn bucket(&self) -> &str {
        self.session.bucket()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
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

    async fn get_signed_url(&self, _path: &str, opts: Option<&SignedUrlOptions>) -> Result<String> {
        opts.ok_or(StorageError::MissingSignedUrlOptions)?;
        Err(StorageError::NotSupported {
            backend: "memory",
            operation: "get_signed_url",
        })
    }

    async fn list_object(&self, query: &ListQuery, options: &[StorageOption]) -> Result<Vec<String>> {
        self.session.list_object(query, options).await
    }
}
