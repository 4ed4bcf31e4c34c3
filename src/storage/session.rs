//! Delegation shared by every object_store-backed adapter
//!
//! A [`Session`] owns the client for one bucket until it is closed. Each
//! call builds a fresh [`Config`] from its own options, resolves its context
//! and tuning from it, and hands the work to the object store unchanged.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::StreamExt;
use object_store::buffered::BufWriter;
use object_store::path::{Path, DELIMITER};
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, GetOptions, GetRange, ListResult, ObjectStore};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::config::Backend;
use crate::errors::{Result, StorageError};
use crate::metrics::OperationTimer;
use crate::options::{Config, ReaderOptions, StorageOption, WriterOptions};
use crate::storage::handles::{ObjectReader, ObjectWriter};
use crate::storage::{ListQuery, SignedUrlOptions};

pub(crate) struct Session<S> {
    backend: Backend,
    bucket: String,
    store: RwLock<Option<Arc<S>>>,
}

impl<S: ObjectStore> Session<S> {
    pub(crate) fn new(backend: Backend, bucket: impl Into<String>, store: Arc<S>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
            store: RwLock::new(Some(store)),
        }
    }

    pub(crate) fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The live client, or `Closed`
    pub(crate) async fn store(&self) -> Result<Arc<S>> {
        self.store.read().await.clone().ok_or(StorageError::Closed)
    }

    /// Drops the client. Closing twice is a no-op.
    pub(crate) async fn close(&self) -> Result<()> {
        if self.store.write().await.take().is_some() {
            debug!(backend = %self.backend, bucket = %self.bucket, "storage session closed");
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self, options), fields(backend = %self.backend))]
    pub(crate) async fn write(&self, path: &str, options: &[StorageOption]) -> Result<ObjectWriter> {
        let timer = OperationTimer::start(self.backend.as_str(), "write");
        let result = self.open_writer(path, options).await;
        timer.finish(&result);
        result
    }

    async fn open_writer(&self, path: &str, options: &[StorageOption]) -> Result<ObjectWriter> {
        let config = Config::from_options(options);
        let ctx = config.operation_ctx();
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let store: Arc<dyn ObjectStore> = self.store().await?;
        let tuning = config.writer_options(self.backend).cloned().unwrap_or_default();
        let location = object_path(path)?;

        let mut writer = match tuning.buffer_size {
            Some(capacity) => BufWriter::with_capacity(store, location, capacity),
            None => BufWriter::new(store, location),
        };
        if let Some(concurrency) = tuning.max_concurrency {
            writer = writer.with_max_concurrency(concurrency);
        }
        writer = writer.with_attributes(write_attributes(path, &tuning));

        Ok(ObjectWriter::new(writer, ctx))
    }

    #[instrument(level = "debug", skip(self, options), fields(backend = %self.backend))]
    pub(crate) async fn read(&self, path: &str, options: &[StorageOption]) -> Result<ObjectReader> {
        let timer = OperationTimer::start(self.backend.as_str(), "read");
        let result = self.open_reader(path, options).await;
        timer.finish(&result);
        result
    }

    async fn open_reader(&self, path: &str, options: &[StorageOption]) -> Result<ObjectReader> {
        let config = Config::from_options(options);
        let ctx = config.operation_ctx();
        let store = self.store().await?;
        let location = object_path(path)?;
        let get_options = read_options(config.reader_options(self.backend));

        let result = ctx.run(store.get_opts(&location, get_options)).await??;
        let meta = result.meta.clone();
        let attributes = result.attributes.clone();
        Ok(ObjectReader::new(meta, attributes, result.into_stream(), ctx))
    }

    #[instrument(level = "debug", skip(self, options), fields(backend = %self.backend))]
    pub(crate) async fn is_exists(&self, path: &str, options: &[StorageOption]) -> Result<bool> {
        let timer = OperationTimer::start(self.backend.as_str(), "is_exists");
        let result = self.head(path, options).await;
        timer.finish(&result);
        result
    }

    async fn head(&self, path: &str, options: &[StorageOption]) -> Result<bool> {
        let config = Config::from_options(options);
        let ctx = config.operation_ctx();
        let store = self.store().await?;
        let location = object_path(path)?;

        match ctx.run(store.head(&location)).await? {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(level = "debug", skip(self, options), fields(backend = %self.backend))]
    pub(crate) async fn list_object(
        &self,
        query: &ListQuery,
        options: &[StorageOption],
    ) -> Result<Vec<String>> {
        let timer = OperationTimer::start(self.backend.as_str(), "list_object");
        let result = self.list(query, options).await;
        timer.finish(&result);
        result
    }

    async fn list(&self, query: &ListQuery, options: &[StorageOption]) -> Result<Vec<String>> {
        let config = Config::from_options(options);
        let ctx = config.operation_ctx();
        let store = self.store().await?;
        let root = listing_root(&query.prefix)?;

        // object_store lists by path segment; list the enclosing directory
        // and filter by the raw prefix afterwards
        let names = if query.delimiter == DELIMITER {
            let level = ctx.run(store.list_with_delimiter(root.as_ref())).await??;
            level_names(level)
        } else {
            ctx.run(async {
                let mut stream = store.list(root.as_ref());
                let mut names = Vec::new();
                while let Some(meta) = stream.next().await {
                    names.push(meta?.location.to_string());
                }
                Ok::<_, object_store::Error>(names)
            })
            .await??
        };

        Ok(apply_query(names, query))
    }

    /// Fetches the first listing entry, so a missing bucket or missing
    /// permissions fail here rather than on first use
    pub(crate) async fn check_bucket(&self, config: &Config) -> Result<()> {
        let ctx = config.init_ctx();
        let store = self.store().await?;

        let first = ctx
            .run(async {
                let mut stream = store.list(None);
                stream.next().await.transpose()
            })
            .await
            .and_then(|res| res.map_err(StorageError::from));

        match first {
            Ok(_) => {
                debug!(backend = %self.backend, bucket = %self.bucket, "bucket check succeeded");
                Ok(())
            }
            Err(source) => Err(StorageError::BucketUnreachable {
                bucket: self.bucket.clone(),
                source: Box::new(source),
            }),
        }
    }
}

impl<S: ObjectStore + Signer> Session<S> {
    #[instrument(level = "debug", skip(self, opts), fields(backend = %self.backend))]
    pub(crate) async fn signed_url(&self, path: &str, opts: Option<&SignedUrlOptions>) -> Result<String> {
        let timer = OperationTimer::start(self.backend.as_str(), "get_signed_url");
        let result = self.sign(path, opts).await;
        timer.finish(&result);
        result
    }

    async fn sign(&self, path: &str, opts: Option<&SignedUrlOptions>) -> Result<String> {
        let opts = opts.ok_or(StorageError::MissingSignedUrlOptions)?;
        let expires_in = opts.expires_in()?;
        let location = object_path(path)?;
        let store = self.store().await?;

        let url = store
            .signed_url(opts.method.clone(), &location, expires_in)
            .await?;
        Ok(url.to_string())
    }
}

fn read_options(tuning: Option<&ReaderOptions>) -> GetOptions {
    let Some(tuning) = tuning else {
        return GetOptions::default();
    };
    GetOptions {
        if_match: tuning.if_match.clone(),
        if_none_match: tuning.if_none_match.clone(),
        range: tuning.range.clone().map(GetRange::Bounded),
        version: tuning.version.clone(),
        ..Default::default()
    }
}

fn write_attributes(path: &str, tuning: &WriterOptions) -> Attributes {
    let mut attributes = Attributes::new();

    let content_type = tuning
        .content_type
        .clone()
        .or_else(|| mime_guess::from_path(path).first().map(|m| m.to_string()));
    if let Some(content_type) = content_type {
        attributes.insert(Attribute::ContentType, content_type.into());
    }
    if let Some(value) = &tuning.cache_control {
        attributes.insert(Attribute::CacheControl, value.clone().into());
    }
    if let Some(value) = &tuning.content_disposition {
        attributes.insert(Attribute::ContentDisposition, value.clone().into());
    }
    if let Some(value) = &tuning.content_encoding {
        attributes.insert(Attribute::ContentEncoding, value.clone().into());
    }
    if let Some(value) = &tuning.content_language {
        attributes.insert(Attribute::ContentLanguage, value.clone().into());
    }

    attributes
}

/// Parses a caller's key without re-encoding it, so the key that was
/// written is the key that is listed.
///
/// Keys that `object_store` would silently normalise (empty segments, a
/// leading or trailing `/`) are rejected instead.
fn object_path(path: &str) -> Result<Path> {
    let invalid = |reason: String| StorageError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(invalid("empty key".to_string()));
    }
    if path.starts_with(DELIMITER) || path.ends_with(DELIMITER) {
        return Err(invalid("leading or trailing delimiter".to_string()));
    }
    Path::parse(path).map_err(|e| invalid(e.to_string()))
}

/// Directory whose listing covers every key starting with `prefix`
fn listing_root(prefix: &str) -> Result<Option<Path>> {
    let Some(idx) = prefix.rfind(DELIMITER) else {
        return Ok(None);
    };
    let dir = &prefix[..idx];
    if dir.is_empty() {
        return Ok(None);
    }
    Path::parse(dir).map(Some).map_err(|e| StorageError::InvalidPath {
        path: prefix.to_string(),
        reason: e.to_string(),
    })
}

/// Flattens one hierarchy level into names, directories ending in `/`,
/// in key order
fn level_names(level: ListResult) -> Vec<String> {
    let mut names: Vec<String> = level
        .objects
        .into_iter()
        .map(|meta| meta.location.to_string())
        .chain(
            level
                .common_prefixes
                .into_iter()
                .map(|dir| format!("{dir}{DELIMITER}")),
        )
        .collect();
    names.sort();
    names
}

/// Keeps names starting with the raw prefix and, when a delimiter is set,
/// collapses everything below the next delimiter into one entry.
fn apply_query(names: Vec<String>, query: &ListQuery) -> Vec<String> {
    let mut out = Vec::with_capacity(names.len());
    let mut collapsed = HashSet::new();

    for name in names {
        let Some(rest) = name.strip_prefix(query.prefix.as_str()) else {
            continue;
        };
        if !query.delimiter.is_empty() {
            if let Some(idx) = rest.find(query.delimiter.as_str()) {
                let entry = format!("{}{}", query.prefix, &rest[..idx + query.delimiter.len()]);
                if collapsed.insert(entry.clone()) {
                    out.push(entry);
                }
                continue;
            }
        }
        out.push(name);
    }

    out
}
