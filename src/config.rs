//! Backend selection and settings loading
//!
//! Supports configuration via:
//! - Environment variables (primary)
//! - Optional TOML settings file (secondary)
//!
//! Environment variables take precedence over file values. Settings only
//! produce [`StorageOption`]s; the adapters still validate them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::context::OperationContext;
use crate::errors::{Result, StorageError};
use crate::options::{self, StorageOption};
use crate::storage::{new_storage, Storage};

/// Storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Google Cloud Storage
    #[serde(alias = "gcs", alias = "google")]
    Gcp,
    /// AWS S3 and S3-compatible services
    #[serde(alias = "aws")]
    S3,
    /// Process-local in-memory store
    #[serde(alias = "mem")]
    Memory,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gcp => "gcp",
            Backend::S3 => "s3",
            Backend::Memory => "memory",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = StorageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gcp" | "gcs" | "google" => Ok(Backend::Gcp),
            "s3" | "aws" => Ok(Backend::S3),
            "memory" | "mem" => Ok(Backend::Memory),
            _ => Err(StorageError::ImplementationNotFound(s.to_string())),
        }
    }
}

/// Settings for one storage backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Backend to construct
    #[serde(default)]
    pub backend: Option<Backend>,

    /// Bucket name
    #[serde(default)]
    pub bucket: Option<String>,

    /// GCP service account JSON file
    #[serde(default)]
    pub secret_path: Option<PathBuf>,

    /// S3 region
    #[serde(default)]
    pub region: Option<String>,

    /// S3 endpoint URL (for S3-compatible services)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Upper bound on backend construction, bucket check included
    #[serde(default)]
    pub init_timeout_secs: Option<u64>,
}

impl Settings {
    /// Load settings from environment variables
    ///
    /// Environment variables:
    /// - UNISTORE_BACKEND: gcp|s3|memory
    /// - UNISTORE_BUCKET: bucket name
    /// - UNISTORE_SECRET_PATH: GCP service account JSON file
    /// - UNISTORE_REGION: S3 region
    /// - UNISTORE_ENDPOINT: S3 endpoint URL
    /// - UNISTORE_INIT_TIMEOUT_SECS: construction timeout
    /// - UNISTORE_CONFIG_FILE: optional path to TOML settings file
    pub fn from_env() -> Result<Self> {
        let mut settings = match std::env::var("UNISTORE_CONFIG_FILE") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StorageError::Settings(e.to_string()))
    }

    /// Overrides fields with values from `lookup`, keyed by the
    /// `UNISTORE_*` variable names
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("UNISTORE_BACKEND") {
            self.backend = Some(backend.parse()?);
        }

        if let Some(bucket) = lookup("UNISTORE_BUCKET") {
            self.bucket = Some(bucket);
        }

        if let Some(path) = lookup("UNISTORE_SECRET_PATH") {
            self.secret_path = Some(PathBuf::from(path));
        }

        if let Some(region) = lookup("UNISTORE_REGION") {
            self.region = Some(region);
        }

        if let Some(endpoint) = lookup("UNISTORE_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }

        if let Some(timeout) = lookup("UNISTORE_INIT_TIMEOUT_SECS") {
            let secs = timeout.parse().map_err(|_| {
                StorageError::Settings(format!("invalid UNISTORE_INIT_TIMEOUT_SECS: {}", timeout))
            })?;
            self.init_timeout_secs = Some(secs);
        }

        Ok(())
    }

    /// Options carrying these settings.
    ///
    /// The init timeout starts counting when this is called.
    pub fn options(&self) -> Vec<StorageOption> {
        let mut opts = Vec::new();

        if let Some(secs) = self.init_timeout_secs {
            let ctx = OperationContext::with_timeout(Duration::from_secs(secs));
            opts.push(options::init_ctx(ctx));
        }

        let settings = self.clone();
        opts.push(StorageOption::new("settings", move |c| {
            if let Some(bucket) = &settings.bucket {
                c.bucket = Some(bucket.clone());
            }
            if let Some(path) = &settings.secret_path {
                c.secret_path = Some(path.clone());
            }
            if let Some(region) = &settings.region {
                c.region = Some(region.clone());
            }
        }));

        if let Some(endpoint) = &self.endpoint {
            opts.push(options::s3_endpoint(endpoint.clone()));
        }

        opts
    }

    /// Constructs the configured backend, appending `extra` after the
    /// settings so they take precedence
    pub async fn connect(&self, extra: &[StorageOption]) -> Result<Arc<dyn Storage>> {
        let backend = self.backend.ok_or(StorageError::MissingInitParam("backend"))?;
        let mut opts = self.options();
        opts.extend_from_slice(extra);
        new_storage(backend, &opts).await
    }
}
