//! Open file handle emulating a seekable file over one-directional streams.
//!
//! Implements the "stream commit model": a write handle feeds a bounded
//! in-process pipe whose other end is consumed by one background upload
//! task, and the object only exists once `close()` has seen that upload
//! commit. A read handle holds one download stream; seeking drops it and
//! opens a new one at the target offset.

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use crate::api::types::{Metadata, WriteMode};
use crate::api::ByteStream;
use crate::error::{Error, Result, StoreError};
use crate::fs::dir_list::DirLister;
use crate::fs::info::FileInfo;
use crate::fs::Fs;

/// Reference point of a [`File::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Offset from the first byte.
    Start,
    /// Offset from the read cursor.
    Current,
    /// Offset counted backwards from the end of the object.
    End,
}

/// Which stream, if any, a handle currently owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleMode {
    Idle,
    Reading,
    Writing,
    Listing,
}

struct ReadStream {
    stream: ByteStream,
    /// Object offset of the next byte the stream delivers.
    offset: u64,
    /// Object size from the cached metadata, for end-relative seeks.
    size: u64,
}

struct WriteStream {
    sink: DuplexStream,
    /// The background upload. Joined by `close()`, aborted if the handle is
    /// dropped first.
    task: JoinHandle<Result<Metadata, StoreError>>,
}

enum HandleState {
    Idle,
    Reading(ReadStream),
    Writing(WriteStream),
    Listing(DirLister),
}

/// A file or directory opened through [`Fs`].
///
/// A handle owns at most one stream. Reading and writing are exclusive and
/// switching between them takes a `close()`. Directory handles only list.
pub struct File {
    fs: Fs,
    path: String,
    state: HandleState,
    /// Metadata from the last stat or commit. Cleared when a write starts.
    cached_info: Option<FileInfo>,
}

impl File {
    pub(crate) fn new(fs: Fs, path: String) -> Self {
        Self {
            fs,
            path,
            state: HandleState::Idle,
            cached_info: None,
        }
    }

    /// Absolute store path of this handle.
    pub fn name(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> HandleMode {
        match self.state {
            HandleState::Idle => HandleMode::Idle,
            HandleState::Reading(_) => HandleMode::Reading,
            HandleState::Writing(_) => HandleMode::Writing,
            HandleState::Listing(_) => HandleMode::Listing,
        }
    }

    /// Read cursor of a read handle.
    pub fn position(&self) -> Option<u64> {
        match &self.state {
            HandleState::Reading(read) => Some(read.offset),
            _ => None,
        }
    }

    // ── Read path ─────────────────────────────────────────────────────────

    /// Open a read stream at offset 0. Fails with `NotFound` if the path
    /// does not exist.
    pub async fn open_read(&mut self) -> Result<()> {
        let size = self.stat().await?.size();
        let stream = self.download(0).await?;
        self.state = HandleState::Reading(ReadStream {
            stream,
            offset: 0,
            size,
        });
        Ok(())
    }

    /// Read into `buf` from the active stream. `Ok(0)` marks the end of the
    /// object.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let HandleState::Reading(read) = &mut self.state else {
            return Err(Error::NoActiveStream);
        };
        let n = read.stream.read(buf).await?;
        read.offset += n as u64;
        Ok(n)
    }

    /// Read until `buf` is full or the object ends. Returns the byte count.
    pub async fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Read `buf.len()` bytes (fewer at the end of the object) starting at
    /// `offset`. Leaves the cursor after the bytes read.
    pub async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.seek(offset_to_i64(offset)?, Whence::Start).await?;
        self.read_full(buf).await
    }

    /// Move the read cursor by reopening the download at the target offset.
    /// Returns the new absolute offset.
    ///
    /// A negative target fails with `InvalidSeek` and keeps the current
    /// stream. Write handles cannot seek.
    pub async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let (current, size) = match &self.state {
            HandleState::Writing(_) => return Err(Error::Unsupported("seek while writing")),
            HandleState::Reading(read) => (read.offset, read.size),
            HandleState::Idle | HandleState::Listing(_) => return Err(Error::HandleClosed),
        };

        let target = match whence {
            Whence::Start => offset,
            Whence::Current => offset_to_i64(current)?.saturating_add(offset),
            // Relies on the size cached when the stream was opened.
            Whence::End => offset_to_i64(size)?.saturating_sub(offset),
        };
        if target < 0 {
            return Err(Error::InvalidSeek(target));
        }
        let target = target as u64;

        // Nothing left to stream, and the HTTP store rejects such a range.
        let stream: ByteStream = if target >= size {
            Box::pin(tokio::io::empty())
        } else {
            self.download(target).await?
        };
        if let HandleState::Reading(read) = &mut self.state {
            read.stream = stream;
            read.offset = target;
        }
        log::debug!("Seeked {} to {}", self.path, target);
        Ok(target)
    }

    async fn download(&self, start: u64) -> Result<ByteStream> {
        self.fs
            .store()
            .download(&self.path, Some(start).filter(|s| *s > 0))
            .await
            .map_err(|e| Error::from_store("download", &self.path, e))
    }

    // ── Write path ────────────────────────────────────────────────────────

    /// Start a new object at this path, replacing any existing one on
    /// `close()`. Spawns the background upload that consumes everything
    /// written until then.
    pub async fn open_write(&mut self) -> Result<()> {
        self.start_upload(WriteMode::Overwrite).await
    }

    /// Like [`File::open_write`], but the commit fails if the path already
    /// exists when `close()` is reached.
    pub async fn open_write_new(&mut self) -> Result<()> {
        self.start_upload(WriteMode::Add).await
    }

    async fn start_upload(&mut self, mode: WriteMode) -> Result<()> {
        match self.state {
            HandleState::Idle => {}
            HandleState::Writing(_) => return Err(Error::AlreadyOpen(self.path.clone())),
            HandleState::Reading(_) | HandleState::Listing(_) => {
                return Err(Error::Unsupported("open for writing before close"))
            }
        }
        if self.cached_info.as_ref().is_some_and(FileInfo::is_dir) {
            return Err(Error::Unsupported("writing to a directory"));
        }

        self.cached_info = None;

        let (sink, source) = tokio::io::duplex(self.fs.config().pipe_capacity);
        let store = self.fs.store_arc();
        let path = self.path.clone();

        let task = tokio::spawn(async move {
            let result = store.upload(&path, mode, Box::pin(source)).await;
            match &result {
                Ok(meta) => log::debug!("Upload of {} finished ({})", path, meta.name()),
                Err(e) => log::warn!("Upload of {} failed: {}", path, e),
            }
            result
        });

        self.state = HandleState::Writing(WriteStream { sink, task });
        log::debug!("Opened {} for writing", self.path);
        Ok(())
    }

    /// Write all of `buf` to the upload. Waits while the pipe is full.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let HandleState::Writing(write) = &mut self.state else {
            return Err(Error::NoActiveStream);
        };
        let result = write.sink.write_all(buf).await;

        match result {
            Ok(()) => Ok(buf.len()),
            // The upload stopped reading: report why.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                Err(self.abandon_write(e).await)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn write_str(&mut self, s: &str) -> Result<usize> {
        self.write(s.as_bytes()).await
    }

    /// Seek to `offset` then write. Only meaningful for handles that can
    /// seek, so a write handle always fails with `Unsupported`.
    pub async fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        self.seek(offset_to_i64(offset)?, Whence::Start).await?;
        self.write(buf).await
    }

    async fn abandon_write(&mut self, io_err: std::io::Error) -> Error {
        let state = std::mem::replace(&mut self.state, HandleState::Idle);
        if let HandleState::Writing(write) = state {
            drop(write.sink);
            if let Ok(Err(source)) = write.task.await {
                return Error::CommitFailed {
                    path: self.path.clone(),
                    source,
                };
            }
        }
        Error::Io(io_err)
    }

    async fn finish_write(&mut self, write: WriteStream) -> Result<()> {
        let WriteStream { mut sink, task } = write;
        if let Err(e) = sink.shutdown().await {
            log::debug!("Shutting down pipe of {}: {}", self.path, e);
        }
        drop(sink);

        match task.await {
            Ok(Ok(meta)) => {
                log::info!("Committed {}", self.path);
                self.cached_info = Some(FileInfo::new(meta));
                Ok(())
            }
            Ok(Err(source)) => Err(Error::CommitFailed {
                path: self.path.clone(),
                source,
            }),
            Err(join_err) => Err(Error::CommitFailed {
                path: self.path.clone(),
                source: StoreError::Io(std::io::Error::other(format!(
                    "upload task ended without a result: {}",
                    join_err
                ))),
            }),
        }
    }

    // ── Common ────────────────────────────────────────────────────────────

    /// Release the active stream. For a write handle this ends the data,
    /// then waits until the store has committed the object.
    pub async fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, HandleState::Idle) {
            HandleState::Writing(write) => self.finish_write(write).await,
            HandleState::Reading(_) | HandleState::Listing(_) | HandleState::Idle => Ok(()),
        }
    }

    /// Metadata of this path, fetched once and then served from the cache.
    pub async fn stat(&mut self) -> Result<FileInfo> {
        if let Some(info) = &self.cached_info {
            return Ok(info.clone());
        }
        let info = self.fs.stat_path(&self.path).await?;
        self.cached_info = Some(info.clone());
        Ok(info)
    }

    /// Nothing is durable before `close()`, so there is nothing to flush.
    pub async fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    pub async fn truncate(&mut self, _size: u64) -> Result<()> {
        Err(Error::Unsupported("truncate"))
    }

    // ── Directory listing ─────────────────────────────────────────────────

    /// Up to `n` further entries of this directory. A result shorter than
    /// `n` means the listing is exhausted; later calls return nothing.
    pub async fn read_dir(&mut self, n: usize) -> Result<Vec<FileInfo>> {
        let store = self.fs.store_arc();
        self.lister()?.next(store.as_ref(), n).await
    }

    /// Same as [`File::read_dir`], returning leaf names.
    pub async fn read_dir_names(&mut self, n: usize) -> Result<Vec<String>> {
        let store = self.fs.store_arc();
        self.lister()?.next_names(store.as_ref(), n).await
    }

    fn lister(&mut self) -> Result<&mut DirLister> {
        if matches!(self.state, HandleState::Idle) {
            let config = self.fs.config();
            self.state = HandleState::Listing(DirLister::new(
                &self.path,
                config.dir_list_limit,
                config.dir_buffer_capacity(),
            ));
        }
        match &mut self.state {
            HandleState::Listing(lister) => Ok(lister),
            _ => Err(Error::Unsupported("listing a handle with an open byte stream")),
        }
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .field("mode", &self.mode())
            .field("position", &self.position())
            .finish()
    }
}

impl Drop for File {
    fn drop(&mut self) {
        // Cancel before the pipe closes, so the upload never sees end of data.
        if let HandleState::Writing(write) = &self.state {
            write.task.abort();
            log::warn!("{} dropped while writing; upload cancelled", self.path);
        }
    }
}

fn offset_to_i64(offset: u64) -> Result<i64> {
    i64::try_from(offset).map_err(|_| Error::InvalidSeek(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryStore;
    use crate::config::FsConfig;
    use std::sync::Arc;

    fn fs_with(content: &'static str) -> Fs {
        let store = MemoryStore::new();
        store.put("/file1", content).unwrap();
        Fs::new(Arc::new(store), FsConfig::default())
    }

    #[tokio::test]
    async fn test_new_handle_is_idle() {
        let fs = fs_with("");
        let file = File::new(fs, "/file1".to_string());
        assert_eq!(file.mode(), HandleMode::Idle);
        assert_eq!(file.position(), None);
        assert_eq!(file.name(), "/file1");
    }

    #[tokio::test]
    async fn test_read_advances_cursor() {
        let fs = fs_with("Hello world !");
        let mut file = fs.open("/file1").await.unwrap();

        let mut buf = [0u8; 5];
        assert_eq!(file.read_full(&mut buf).await.unwrap(), 5);
        assert_eq!(&buf, b"Hello");
        assert_eq!(file.position(), Some(5));
    }

    #[tokio::test]
    async fn test_negative_seek_keeps_state() {
        let fs = fs_with("Hello world !");
        let mut file = fs.open("/file1").await.unwrap();
        let mut buf = [0u8; 2];
        file.read_full(&mut buf).await.unwrap();

        let err = file.seek(-3, Whence::Current).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSeek(-1)));
        assert_eq!(file.position(), Some(2));

        let err = file.seek(20, Whence::End).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSeek(-7)));

        // The original stream is still usable.
        file.read_full(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ll");
    }

    #[tokio::test]
    async fn test_read_on_idle_handle() {
        let fs = fs_with("");
        let mut file = File::new(fs, "/file1".to_string());
        let mut buf = [0u8; 4];
        assert!(matches!(file.read(&mut buf).await, Err(Error::NoActiveStream)));
        assert!(matches!(file.write(b"x").await, Err(Error::NoActiveStream)));
        assert!(matches!(file.seek(0, Whence::Start).await, Err(Error::HandleClosed)));
    }

    #[tokio::test]
    async fn test_second_open_write_is_rejected() {
        let fs = fs_with("");
        let mut file = fs.open_file("/new", crate::fs::OpenFlags::WRITE).await.unwrap();
        let err = file.open_write().await.unwrap_err();
        assert!(matches!(err, Error::AlreadyOpen(ref path) if path == "/new"));
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_write_requires_closed_handle() {
        let fs = fs_with("Hello world !");
        let mut file = fs.open("/file1").await.unwrap();
        let err = file.open_write().await.unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert_eq!(file.mode(), HandleMode::Reading);

        file.close().await.unwrap();
        file.open_write().await.unwrap();
        assert_eq!(file.mode(), HandleMode::Writing);
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_write_refused_on_directory() {
        let fs = fs_with("");
        fs.mkdir("/dir1").await.unwrap();

        let mut dir = fs.open("/dir1").await.unwrap();
        assert!(matches!(dir.open_write().await, Err(Error::Unsupported(_))));
        assert_eq!(dir.mode(), HandleMode::Idle);

        dir.read_dir(10).await.unwrap();
        assert!(matches!(dir.open_write().await, Err(Error::Unsupported(_))));
        assert_eq!(dir.mode(), HandleMode::Listing);
        assert!(fs.stat("/dir1").await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_listing_refused_with_open_stream() {
        let fs = fs_with("abc");
        let mut file = fs.open("/file1").await.unwrap();
        assert!(matches!(file.read_dir(1).await, Err(Error::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_offset_conversion() {
        assert_eq!(offset_to_i64(8).unwrap(), 8);
        assert!(matches!(offset_to_i64(u64::MAX), Err(Error::InvalidSeek(_))));
    }
}
