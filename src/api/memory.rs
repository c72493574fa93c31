//! In-process remote store.
//!
//! Behaves like the HTTP store from the caller's point of view: uploads only
//! become visible once their source is fully consumed, downloads stream from
//! an offset, listings are paginated behind opaque cursors, and failures carry
//! the same error summaries.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use tokio::io::AsyncReadExt;

use super::types::{FileMetadata, FolderMetadata, ListFolderResult, Metadata, WriteMode};
use super::{ByteStream, RemoteStore, UploadSource};
use crate::error::StoreError;

/// Entries per page when the caller does not ask for a limit.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// HTTP status the store uses for endpoint-specific errors.
const CONFLICT: u16 = 409;

#[derive(Debug, Clone)]
enum Node {
    File {
        id: u64,
        data: Bytes,
        modified: DateTime<Utc>,
        rev: u64,
    },
    Folder {
        id: u64,
    },
}

/// Remote store keeping every object in memory.
pub struct MemoryStore {
    /// Absolute path -> node. The root `/` is always present.
    nodes: Mutex<BTreeMap<String, Node>>,
    default_page_size: u32,
    next_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a store whose listings return at most `page_size` entries per
    /// page unless the caller asks for fewer.
    pub fn with_page_size(page_size: u32) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Folder { id: 0 });
        Self {
            nodes: Mutex::new(nodes),
            default_page_size: page_size.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store `data` at `path` directly, creating missing parent folders.
    pub fn put(&self, path: &str, data: impl Into<Bytes>) -> Result<Metadata, StoreError> {
        let mut nodes = self.lock();
        self.commit(&mut nodes, path, WriteMode::Overwrite, data.into())
    }

    /// Number of objects (files and folders, root excluded).
    pub fn len(&self) -> usize {
        self.lock().len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Node>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn commit(
        &self,
        nodes: &mut BTreeMap<String, Node>,
        path: &str,
        mode: WriteMode,
        data: Bytes,
    ) -> Result<Metadata, StoreError> {
        if path == "/" {
            return Err(StoreError::api(CONFLICT, "path/conflict/folder/"));
        }
        let id = match nodes.get(path) {
            Some(Node::Folder { .. }) => {
                return Err(StoreError::api(CONFLICT, "path/conflict/folder/"))
            }
            Some(Node::File { .. }) if mode == WriteMode::Add => {
                return Err(StoreError::api(CONFLICT, "path/conflict/file/"))
            }
            Some(Node::File { id, .. }) => *id,
            None => {
                self.create_parents(nodes, path)?;
                self.next_id()
            }
        };

        let node = Node::File {
            id,
            data,
            modified: Utc::now().trunc_subsecs(0),
            rev: self.next_id(),
        };
        let meta = metadata_for(path, &node);
        nodes.insert(path.to_string(), node);
        Ok(meta)
    }

    /// Create every missing ancestor folder of `path`.
    fn create_parents(
        &self,
        nodes: &mut BTreeMap<String, Node>,
        path: &str,
    ) -> Result<(), StoreError> {
        let mut prefix = String::new();
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        for component in components.iter().take(components.len().saturating_sub(1)) {
            prefix.push('/');
            prefix.push_str(component);
            match nodes.get(&prefix) {
                Some(Node::Folder { .. }) => {}
                Some(Node::File { .. }) => {
                    return Err(StoreError::api(CONFLICT, "path/conflict/file/"))
                }
                None => {
                    let id = self.next_id();
                    nodes.insert(prefix.clone(), Node::Folder { id });
                }
            }
        }
        Ok(())
    }

    fn page(&self, path: &str, offset: usize, limit: u32) -> Result<ListFolderResult, StoreError> {
        let nodes = self.lock();
        match nodes.get(path) {
            Some(Node::Folder { .. }) => {}
            Some(Node::File { .. }) => {
                return Err(StoreError::api(CONFLICT, "path/not_folder/"))
            }
            None => return Err(StoreError::api(CONFLICT, "path/not_found/")),
        }

        let children: Vec<Metadata> = nodes
            .iter()
            .filter(|(key, _)| parent_of(key) == Some(path))
            .map(|(key, node)| metadata_for(key, node))
            .collect();

        let end = children.len().min(offset + limit as usize);
        let entries = children.get(offset..end).unwrap_or_default().to_vec();
        Ok(ListFolderResult {
            entries,
            cursor: encode_cursor(path, end, limit),
            has_more: end < children.len(),
        })
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upload(
        &self,
        path: &str,
        mode: WriteMode,
        mut source: UploadSource,
    ) -> Result<Metadata, StoreError> {
        let mut data = Vec::new();
        source.read_to_end(&mut data).await?;

        let mut nodes = self.lock();
        let meta = self.commit(&mut nodes, path, mode, Bytes::from(data))?;
        log::debug!("memory store committed {}", path);
        Ok(meta)
    }

    async fn download(&self, path: &str, start: Option<u64>) -> Result<ByteStream, StoreError> {
        let nodes = self.lock();
        match nodes.get(path) {
            Some(Node::File { data, .. }) => {
                let start = start.unwrap_or(0).min(data.len() as u64) as usize;
                Ok(Box::pin(Cursor::new(data.slice(start..))))
            }
            Some(Node::Folder { .. }) => Err(StoreError::api(CONFLICT, "path/not_file/")),
            None => Err(StoreError::api(CONFLICT, "path/not_found/")),
        }
    }

    async fn list_folder(
        &self,
        path: &str,
        limit: Option<u32>,
    ) -> Result<ListFolderResult, StoreError> {
        let limit = limit.unwrap_or(self.default_page_size).max(1);
        self.page(path, 0, limit)
    }

    async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderResult, StoreError> {
        let (path, offset, limit) = decode_cursor(cursor)?;
        self.page(&path, offset, limit)
    }

    async fn get_metadata(&self, path: &str) -> Result<Metadata, StoreError> {
        let nodes = self.lock();
        nodes
            .get(path)
            .map(|node| metadata_for(path, node))
            .ok_or_else(|| StoreError::api(CONFLICT, "path/not_found/"))
    }

    async fn delete(&self, path: &str) -> Result<Metadata, StoreError> {
        let mut nodes = self.lock();
        if path == "/" {
            return Err(StoreError::api(CONFLICT, "path_lookup/restricted_content/"));
        }
        let node = nodes
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::api(CONFLICT, "path_lookup/not_found/"))?;

        nodes.retain(|key, _| !is_same_or_below(key, path));
        Ok(metadata_for(path, &node))
    }

    async fn move_path(&self, from: &str, to: &str) -> Result<Metadata, StoreError> {
        let mut nodes = self.lock();
        if !nodes.contains_key(from) || from == "/" {
            return Err(StoreError::api(CONFLICT, "from_lookup/not_found/"));
        }
        if nodes.contains_key(to) {
            return Err(StoreError::api(CONFLICT, "to/conflict/"));
        }
        if is_same_or_below(to, from) {
            return Err(StoreError::api(CONFLICT, "duplicated_or_nested_paths/"));
        }
        self.create_parents(&mut nodes, to)?;

        let moved: Vec<(String, Node)> = nodes
            .iter()
            .filter(|(key, _)| is_same_or_below(key, from))
            .map(|(key, node)| (format!("{}{}", to, &key[from.len()..]), node.clone()))
            .collect();
        nodes.retain(|key, _| !is_same_or_below(key, from));

        let mut result = None;
        for (key, node) in moved {
            if key == to {
                result = Some(metadata_for(&key, &node));
            }
            nodes.insert(key, node);
        }
        result.ok_or_else(|| StoreError::api(CONFLICT, "from_lookup/not_found/"))
    }

    async fn create_folder(&self, path: &str) -> Result<FolderMetadata, StoreError> {
        let mut nodes = self.lock();
        if nodes.contains_key(path) {
            return Err(StoreError::api(CONFLICT, "path/conflict/folder/"));
        }
        self.create_parents(&mut nodes, path)?;

        let id = self.next_id();
        nodes.insert(path.to_string(), Node::Folder { id });
        Ok(FolderMetadata {
            name: leaf_name(path).to_string(),
            path_display: Some(path.to_string()),
            id: Some(format!("id:{}", id)),
        })
    }
}

fn metadata_for(path: &str, node: &Node) -> Metadata {
    match node {
        Node::File {
            id,
            data,
            modified,
            rev,
        } => Metadata::File(FileMetadata {
            name: leaf_name(path).to_string(),
            path_display: Some(path.to_string()),
            id: Some(format!("id:{}", id)),
            size: data.len() as u64,
            client_modified: *modified,
            server_modified: Some(*modified),
            rev: Some(format!("{:09x}", rev)),
        }),
        Node::Folder { id } => Metadata::Folder(FolderMetadata {
            name: leaf_name(path).to_string(),
            path_display: Some(path.to_string()),
            id: Some(format!("id:{}", id)),
        }),
    }
}

fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

fn is_same_or_below(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

fn encode_cursor(path: &str, offset: usize, limit: u32) -> String {
    let raw = format!("{}:{}:{}", offset, limit, path);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw)
}

fn decode_cursor(cursor: &str) -> Result<(String, usize, u32), StoreError> {
    let invalid = || StoreError::InvalidCursor(cursor.to_string());
    let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| invalid())?;
    let raw = String::from_utf8(raw).map_err(|_| invalid())?;

    let mut parts = raw.splitn(3, ':');
    let offset = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let limit = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let path = parts.next().ok_or_else(invalid)?;
    Ok((path.to_string(), offset, limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(data: &'static [u8]) -> UploadSource {
        Box::pin(data)
    }

    #[tokio::test]
    async fn test_upload_creates_parents() {
        let store = MemoryStore::new();
        let meta = store
            .upload("/a/b/c.txt", WriteMode::Overwrite, source(b"abc"))
            .await
            .unwrap();
        assert_eq!(meta.name(), "c.txt");

        assert!(store.get_metadata("/a").await.unwrap().is_folder());
        assert!(store.get_metadata("/a/b").await.unwrap().is_folder());
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_upload_add_mode_conflicts() {
        let store = MemoryStore::new();
        store.put("/a.txt", "one").unwrap();

        let err = store
            .upload("/a.txt", WriteMode::Add, source(b"two"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Api { ref summary, .. } if summary.starts_with("path/conflict/")));
    }

    #[tokio::test]
    async fn test_download_from_offset() {
        let store = MemoryStore::new();
        store.put("/f", "Hello world !").unwrap();

        let mut stream = store.download("/f", Some(6)).await.unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "world !");

        let mut stream = store.download("/f", Some(100)).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_missing_paths_report_not_found() {
        let store = MemoryStore::new();
        assert!(store.get_metadata("/nope").await.unwrap_err().is_not_found());
        assert!(store.download("/nope", None).await.err().unwrap().is_not_found());
        assert!(store.list_folder("/nope", None).await.unwrap_err().is_not_found());
        assert!(store.delete("/nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_listing_pages_through_cursor() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.put(&format!("/dir/file_{}.txt", i), "x").unwrap();
        }
        store.put("/dir/sub/deep.txt", "x").unwrap();

        let first = store.list_folder("/dir", Some(2)).await.unwrap();
        assert_eq!(first.entries.len(), 2);
        assert!(first.has_more);

        let second = store.list_folder_continue(&first.cursor).await.unwrap();
        assert_eq!(second.entries.len(), 2);
        assert!(second.has_more);

        let third = store.list_folder_continue(&second.cursor).await.unwrap();
        let names: Vec<&str> = third.entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["file_4.txt", "sub"]);
        assert!(!third.has_more);
    }

    #[tokio::test]
    async fn test_invalid_cursor() {
        let store = MemoryStore::new();
        let err = store.list_folder_continue("not a cursor!").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidCursor(_)));
    }

    #[tokio::test]
    async fn test_move_subtree() {
        let store = MemoryStore::new();
        store.put("/src/a.txt", "a").unwrap();
        store.put("/src/nested/b.txt", "b").unwrap();

        let meta = store.move_path("/src", "/dst").await.unwrap();
        assert!(meta.is_folder());
        assert!(store.get_metadata("/src").await.is_err());
        assert!(store.get_metadata("/dst/nested/b.txt").await.is_ok());

        let err = store.move_path("/dst", "/dst/inner").await.unwrap_err();
        assert!(matches!(err, StoreError::Api { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_recursive() {
        let store = MemoryStore::new();
        store.put("/d/a.txt", "a").unwrap();
        store.put("/d/e/b.txt", "b").unwrap();
        store.put("/dd.txt", "c").unwrap();

        store.delete("/d").await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get_metadata("/dd.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_folder_conflict() {
        let store = MemoryStore::new();
        store.create_folder("/x").await.unwrap();
        let err = store.create_folder("/x").await.unwrap_err();
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(parent_of("/a"), Some("/"));
        assert_eq!(parent_of("/a/b"), Some("/a"));
        assert_eq!(parent_of("/"), None);
        assert!(is_same_or_below("/a/b", "/a"));
        assert!(!is_same_or_below("/ab", "/a"));
        assert_eq!(leaf_name("/a/b.txt"), "b.txt");
    }
}
