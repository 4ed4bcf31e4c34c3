//! Error types for unistore
//!
//! Every failure is returned to the caller as a [`StorageError`]. Provider
//! failures are carried verbatim in [`StorageError::Provider`] so callers can
//! match on the underlying `object_store` error kind.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend selector does not name an available implementation
    #[error("implementation not found: {0}")]
    ImplementationNotFound(String),

    /// A parameter required to construct the backend was not supplied
    #[error("missing init parameter: {0}")]
    MissingInitParam(&'static str),

    /// The secret file could not be read
    #[error("failed to read secret file {path}: {source}")]
    SecretRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The secret file is not a valid credential document
    #[error("malformed secret file: {0}")]
    SecretParse(#[source] serde_json::Error),

    /// A required credential field is absent or empty
    #[error("secret file is missing field `{0}`")]
    MissingCredential(&'static str),

    /// The bucket check run at construction failed
    #[error("bucket {bucket} is not reachable: {source}")]
    BucketUnreachable {
        bucket: String,
        #[source]
        source: Box<StorageError>,
    },

    /// The object path cannot be used as a key
    #[error("invalid object path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("must specify signed URL options")]
    MissingSignedUrlOptions,

    #[error("invalid signed URL options: {0}")]
    InvalidSignedUrlOptions(String),

    /// The backend does not offer this operation
    #[error("operation not supported by {backend} backend: {operation}")]
    NotSupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    #[error("operation cancelled")]
    Cancelled,

    /// The storage handle was closed
    #[error("storage is closed")]
    Closed,

    /// Error surfaced by the underlying object store client
    #[error("storage provider error: {0}")]
    Provider(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file or environment could not be interpreted
    #[error("settings error: {0}")]
    Settings(String),
}

impl StorageError {
    /// Whether the provider reported the object as missing
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::Provider(object_store::Error::NotFound { .. })
        )
    }

    /// Whether the operation context ended the call
    pub fn is_context_error(&self) -> bool {
        matches!(self, StorageError::DeadlineExceeded | StorageError::Cancelled)
    }

    /// Converts into an `io::Error` for use inside stream handles, keeping
    /// `self` as the inner error.
    pub(crate) fn into_io(self) -> std::io::Error {
        use std::io::ErrorKind;

        let kind = match &self {
            StorageError::DeadlineExceeded => ErrorKind::TimedOut,
            StorageError::Cancelled => ErrorKind::Interrupted,
            StorageError::Closed => ErrorKind::NotConnected,
            StorageError::Provider(object_store::Error::NotFound { .. }) => ErrorKind::NotFound,
            StorageError::Io(e) => e.kind(),
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, self)
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = StorageError::Provider(object_store::Error::NotFound {
            path: "a/b".to_string(),
            source: "missing".into(),
        });
        assert!(err.is_not_found());
        assert!(!StorageError::Closed.is_not_found());
    }

    #[test]
    fn test_context_errors_map_to_io_kinds() {
        let timed_out = StorageError::DeadlineExceeded.into_io();
        assert_eq!(timed_out.kind(), std::io::ErrorKind::TimedOut);

        let inner = timed_out
            .into_inner()
            .and_then(|e| e.downcast::<StorageError>().ok())
            .map(|e| *e);
        assert!(matches!(inner, Some(StorageError::DeadlineExceeded)));

        let cancelled = StorageError::Cancelled.into_io();
        assert_eq!(cancelled.kind(), std::io::ErrorKind::Interrupted);
    }

    #[test]
    fn test_signed_url_message() {
        assert_eq!(
            StorageError::MissingSignedUrlOptions.to_string(),
            "must specify signed URL options"
        );
    }
}
