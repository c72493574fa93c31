//! Seekable file handles and paginated directory listings over a remote
//! object store that only offers whole-object streaming uploads, streaming
//! downloads from an offset and cursor-based listings.

pub mod api;
pub mod config;
pub mod error;
pub mod fs;

pub use api::{DropboxClient, MemoryStore, RemoteStore};
pub use config::{DropboxConfig, FsConfig};
pub use error::{Error, Result, StoreError};
pub use fs::{File, FileInfo, Fs, HandleMode, OpenFlags, Whence};
