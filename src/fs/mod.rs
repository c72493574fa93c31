//! Filesystem facade over a [`RemoteStore`].
//!
//! Resolves caller paths against the configured root and turns path
//! operations into store calls. Handles created here share the store client
//! and configuration of the facade that opened them.

pub mod dir_list;
pub mod file_handle;
pub mod info;
pub mod path;


use std::ops::BitOr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::api::types::{FolderMetadata, Metadata};
use crate::api::RemoteStore;
use crate::config::FsConfig;
use crate::error::{Error, Result};

pub use dir_list::DirLister;
pub use file_handle::{File, HandleMode, Whence};
pub use info::FileInfo;

/// Access flags for [`Fs::open_file`], combined with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags(u32);

impl OpenFlags {
    pub const READ: Self = Self(0);
    pub const WRITE: Self = Self(1);
    pub const READ_WRITE: Self = Self(1 << 1);
    pub const APPEND: Self = Self(1 << 2);
    pub const CREATE: Self = Self(1 << 3);
    /// Accepted and implied: every write replaces the whole object.
    pub const TRUNCATE: Self = Self(1 << 4);
    /// With `CREATE`: the commit fails if the path already exists.
    pub const EXCLUSIVE: Self = Self(1 << 5);

    pub fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

struct FsInner {
    store: Arc<dyn RemoteStore>,
    config: FsConfig,
}

/// Path-level entry point. Cheap to clone.
#[derive(Clone)]
pub struct Fs {
    inner: Arc<FsInner>,
}

impl Fs {
    pub fn new(store: Arc<dyn RemoteStore>, config: FsConfig) -> Self {
        let config = FsConfig {
            root: path::join("/", &config.root),
            ..config
        };
        Self {
            inner: Arc::new(FsInner { store, config }),
        }
    }

    /// A facade over the same store rooted at `root`.
    pub fn with_root(&self, root: &str) -> Self {
        Self::new(
            self.inner.store.clone(),
            self.inner.config.clone().with_root(root),
        )
    }

    pub fn name(&self) -> &'static str {
        self.inner.store.name()
    }

    pub fn config(&self) -> &FsConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &dyn RemoteStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn store_arc(&self) -> Arc<dyn RemoteStore> {
        self.inner.store.clone()
    }

    /// Absolute store path of `name` under the root.
    pub fn resolve(&self, name: &str) -> String {
        path::join(&self.inner.config.root, name)
    }

    // ── Opening ───────────────────────────────────────────────────────────

    /// Open for reading. Directories open as listing handles.
    pub async fn open(&self, name: &str) -> Result<File> {
        self.open_file(name, OpenFlags::READ).await
    }

    /// Open with explicit flags. Write or create start a new object that
    /// replaces any existing one on close, unless `CREATE | EXCLUSIVE` asks
    /// for a fresh one. Read-write and append cannot be expressed over
    /// one-directional streams.
    pub async fn open_file(&self, name: &str, flags: OpenFlags) -> Result<File> {
        if flags.contains(OpenFlags::READ_WRITE) {
            return Err(Error::Unsupported("read-write open"));
        }
        if flags.contains(OpenFlags::APPEND) {
            return Err(Error::Unsupported("append"));
        }

        let mut file = File::new(self.clone(), self.resolve(name));

        if flags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE) {
            file.open_write_new().await?;
            return Ok(file);
        }
        if flags.contains(OpenFlags::WRITE) || flags.contains(OpenFlags::CREATE) {
            file.open_write().await?;
            return Ok(file);
        }

        if file.stat().await?.is_dir() {
            return Ok(file);
        }
        file.open_read().await?;
        Ok(file)
    }

    /// Create (or replace) `name` as an empty object and return a handle
    /// already open for writing its content.
    pub async fn create(&self, name: &str) -> Result<File> {
        let mut file = self.open_file(name, OpenFlags::WRITE).await?;
        file.close().await?;
        file.open_write().await?;
        log::debug!("Created {}", file.name());
        Ok(file)
    }

    // ── Directories ───────────────────────────────────────────────────────

    pub async fn mkdir(&self, name: &str) -> Result<FolderMetadata> {
        let path = self.resolve(name);
        let folder = self
            .store()
            .create_folder(&path)
            .await
            .map_err(|e| Error::from_store("mkdir", &path, e))?;
        log::info!("Created folder {}", path);
        Ok(folder)
    }

    /// Create `name` and every missing ancestor. Existing folders are kept.
    pub async fn mkdir_all(&self, name: &str) -> Result<()> {
        let full = self.resolve(name);
        for prefix in path::prefixes(&full) {
            match self.stat_path(&prefix).await {
                Ok(info) if info.is_dir() => continue,
                Ok(_) | Err(Error::NotFound(_)) => {
                    self.store()
                        .create_folder(&prefix)
                        .await
                        .map_err(|e| Error::from_store("mkdir", &prefix, e))?;
                    log::debug!("Created folder {}", prefix);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // ── Mutations ─────────────────────────────────────────────────────────

    pub async fn remove(&self, name: &str) -> Result<Metadata> {
        let path = self.resolve(name);
        let meta = self
            .store()
            .delete(&path)
            .await
            .map_err(|e| Error::from_store("remove", &path, e))?;
        log::info!("Removed {}", path);
        Ok(meta)
    }

    /// Delete is recursive on the store side, so this is [`Fs::remove`].
    pub async fn remove_all(&self, name: &str) -> Result<Metadata> {
        self.remove(name).await
    }

    pub async fn rename(&self, old_name: &str, new_name: &str) -> Result<Metadata> {
        let from = self.resolve(old_name);
        let to = self.resolve(new_name);
        let meta = self
            .store()
            .move_path(&from, &to)
            .await
            .map_err(|e| Error::from_store("rename", &from, e))?;
        log::info!("Renamed {} to {}", from, to);
        Ok(meta)
    }

    // ── Metadata ──────────────────────────────────────────────────────────

    /// Fresh metadata of `name`. `NotFound` is distinguished from other
    /// store failures.
    pub async fn stat(&self, name: &str) -> Result<FileInfo> {
        self.stat_path(&self.resolve(name)).await
    }

    pub(crate) async fn stat_path(&self, path: &str) -> Result<FileInfo> {
        // The HTTP store has no metadata for its root.
        if path == "/" {
            return Ok(FileInfo::new(Metadata::Folder(FolderMetadata {
                name: String::new(),
                path_display: Some("/".to_string()),
                id: None,
            })));
        }
        self.store()
            .get_metadata(path)
            .await
            .map(FileInfo::new)
            .map_err(|e| Error::from_store("stat", path, e))
    }

    pub async fn chmod(&self, _name: &str, _mode: u32) -> Result<()> {
        Err(Error::Unsupported("chmod"))
    }

    pub async fn chown(&self, _name: &str, _uid: u32, _gid: u32) -> Result<()> {
        Err(Error::Unsupported("chown"))
    }

    pub async fn chtimes(
        &self,
        _name: &str,
        _atime: DateTime<Utc>,
        _mtime: DateTime<Utc>,
    ) -> Result<()> {
        Err(Error::Unsupported("chtimes"))
    }
}

impl std::fmt::Debug for Fs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fs")
            .field("store", &self.name())
            .field("config", &self.inner.config)
            .finish()
    }
}
