//! Remote store capability and its implementations.
//!
//! `RemoteStore` is the only thing the filesystem layer knows about the
//! store: one-shot streaming uploads that commit on end of data, reads that
//! stream from an offset, paginated listings, and metadata lookups.
//! `DropboxClient` speaks the HTTP API, `MemoryStore` keeps objects in process.

pub mod client;
pub mod files;
pub mod memory;
pub mod types;

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::StoreError;
use types::{FolderMetadata, ListFolderResult, Metadata, WriteMode};

pub use client::DropboxClient;
pub use memory::MemoryStore;

/// Byte stream returned by a download.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Byte source consumed by an upload until it reports end of data.
pub type UploadSource = Pin<Box<dyn AsyncRead + Send + Sync>>;

/// Primitive operations of a stream-oriented remote object store.
///
/// Implementations must be safe to share between handles: several uploads
/// and downloads may be in flight at once.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short name of the backend.
    fn name(&self) -> &'static str;

    /// Stream `source` to `path` and commit it atomically once the source
    /// ends. Returns the metadata of the committed object.
    async fn upload(
        &self,
        path: &str,
        mode: WriteMode,
        source: UploadSource,
    ) -> Result<Metadata, StoreError>;

    /// Open a sequential read of `path`, starting at byte `start` if given.
    async fn download(&self, path: &str, start: Option<u64>) -> Result<ByteStream, StoreError>;

    /// First page of the entries of `path`, at most `limit` when given.
    async fn list_folder(
        &self,
        path: &str,
        limit: Option<u32>,
    ) -> Result<ListFolderResult, StoreError>;

    /// Next page for a cursor returned by a previous listing call.
    async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderResult, StoreError>;

    async fn get_metadata(&self, path: &str) -> Result<Metadata, StoreError>;

    /// Delete a file, or a folder with everything below it.
    async fn delete(&self, path: &str) -> Result<Metadata, StoreError>;

    async fn move_path(&self, from: &str, to: &str) -> Result<Metadata, StoreError>;

    async fn create_folder(&self, path: &str) -> Result<FolderMetadata, StoreError>;
}
