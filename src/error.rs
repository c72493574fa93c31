//! Error types for the remote store and the filesystem layer.
//!
//! `StoreError` is what a `RemoteStore` reports. `Error` is the taxonomy the
//! filesystem facade and its handles expose to callers; store failures are
//! carried through it with the operation name and path attached.

use thiserror::Error;

/// Summary prefixes the store uses when a path does not exist.
const NOT_FOUND_PREFIXES: [&str; 2] = ["path/not_found/", "path_lookup/not_found/"];

/// Failure reported by a remote store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store answered with a structured error.
    #[error("store error ({status}): {summary}")]
    Api { status: u16, summary: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid list cursor: {0}")]
    InvalidCursor(String),
}

impl StoreError {
    /// Build an API error from an HTTP status and an error summary.
    pub fn api(status: u16, summary: impl Into<String>) -> Self {
        StoreError::Api {
            status,
            summary: summary.into(),
        }
    }

    /// Whether the store reported that the path does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::Api { summary, .. } => NOT_FOUND_PREFIXES
                .iter()
                .any(|prefix| summary.starts_with(prefix)),
            _ => false,
        }
    }
}

/// Errors returned by [`crate::Fs`] and [`crate::File`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    /// The store cannot provide this operation.
    #[error("operation not supported by the remote store: {0}")]
    Unsupported(&'static str),

    #[error("already opened for writing: {0}")]
    AlreadyOpen(String),

    #[error("invalid seek offset: {0}")]
    InvalidSeek(i64),

    #[error("file is closed")]
    HandleClosed,

    #[error("no active stream for this operation")]
    NoActiveStream,

    #[error("commit of {path} failed: {source}")]
    CommitFailed {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("listing {path} failed: {source}")]
    ListFailed {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("{op} {path} failed: {source}")]
    Store {
        op: &'static str,
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a store failure, mapping the store's not-found condition to
    /// [`Error::NotFound`].
    pub(crate) fn from_store(op: &'static str, path: &str, source: StoreError) -> Self {
        if source.is_not_found() {
            Error::NotFound(path.to_string())
        } else {
            Error::Store {
                op,
                path: path.to_string(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_summary_prefixes() {
        assert!(StoreError::api(409, "path/not_found/..").is_not_found());
        assert!(StoreError::api(409, "path_lookup/not_found/...").is_not_found());
        assert!(!StoreError::api(409, "path/conflict/folder/").is_not_found());
        assert!(!StoreError::InvalidCursor("x".into()).is_not_found());
    }

    #[test]
    fn test_from_store_maps_not_found() {
        let err = Error::from_store("stat", "/a", StoreError::api(409, "path/not_found/"));
        assert!(err.is_not_found());

        let err = Error::from_store("stat", "/a", StoreError::api(500, "internal_error/"));
        match err {
            Error::Store { op, path, .. } => {
                assert_eq!(op, "stat");
                assert_eq!(path, "/a");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
