//! Incremental directory listing over the store's paginated list calls.
//!
//! The store decides how many entries a page holds; callers ask for `n`
//! entries at a time. Pages are buffered and handed out in order, and a
//! drained listing answers with short (eventually empty) results instead of
//! an end-of-listing error.

use std::collections::VecDeque;

use crate::api::types::Metadata;
use crate::api::RemoteStore;
use crate::error::{Error, Result};
use crate::fs::info::FileInfo;
use crate::fs::path;

/// Listing state of one directory handle.
pub struct DirLister {
    path: String,
    /// Page size asked of the store on the first call.
    limit: Option<u32>,
    buffer: VecDeque<Metadata>,
    /// `None` until the first page has been fetched.
    cursor: Option<String>,
    has_more: bool,
}

impl DirLister {
    pub fn new(path: &str, limit: Option<u32>, capacity: usize) -> Self {
        Self {
            path: path.to_string(),
            limit,
            buffer: VecDeque::with_capacity(capacity),
            cursor: None,
            has_more: false,
        }
    }

    /// Whether every page has been fetched and handed out.
    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_some() && !self.has_more && self.buffer.is_empty()
    }

    /// Up to `n` further entries. Fewer than `n` means the listing is done.
    pub async fn next(&mut self, store: &dyn RemoteStore, n: usize) -> Result<Vec<FileInfo>> {
        let mut out: Vec<Metadata> = Vec::with_capacity(n.min(self.buffer.capacity()));

        while out.len() < n {
            if self.buffer.is_empty() {
                if self.cursor.is_some() && !self.has_more {
                    break;
                }
                if let Err(e) = self.fetch(store).await {
                    // Hand the already collected entries back so a retry sees them.
                    for entry in out.into_iter().rev() {
                        self.buffer.push_front(entry);
                    }
                    return Err(e);
                }
                continue;
            }

            let take = (n - out.len()).min(self.buffer.len());
            out.extend(self.buffer.drain(..take));
        }

        Ok(out.into_iter().map(FileInfo::new).collect())
    }

    /// Same as [`DirLister::next`], projected to leaf names.
    pub async fn next_names(&mut self, store: &dyn RemoteStore, n: usize) -> Result<Vec<String>> {
        let entries = self.next(store, n).await?;
        Ok(entries
            .iter()
            .map(|info| path::base_name(info.name()).to_string())
            .collect())
    }

    async fn fetch(&mut self, store: &dyn RemoteStore) -> Result<()> {
        let result = match &self.cursor {
            None => store.list_folder(&self.path, self.limit).await,
            Some(cursor) => store.list_folder_continue(cursor).await,
        }
        .map_err(|source| Error::ListFailed {
            path: self.path.clone(),
            source,
        })?;

        log::debug!(
            "Listed {} entries of {} (more: {})",
            result.entries.len(),
            self.path,
            result.has_more
        );

        self.buffer.extend(result.entries);
        self.has_more = result.has_more;
        self.cursor = Some(result.cursor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryStore;
    use std::collections::HashSet;

    fn store_with(count: usize, page_size: u32) -> MemoryStore {
        let store = MemoryStore::with_page_size(page_size);
        for i in 0..count {
            store.put(&format!("/dir/entry_{:03}", i), "x").unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_next_spans_pages() {
        let store = store_with(5, 2);
        let mut lister = DirLister::new("/dir", None, 16);

        let entries = lister.next(&store, 1000).await.unwrap();
        assert_eq!(entries.len(), 5);
        assert!(lister.is_exhausted());
    }

    #[tokio::test]
    async fn test_short_reads_then_empty() {
        let store = store_with(5, 1000);
        let mut lister = DirLister::new("/dir", Some(2), 16);

        assert_eq!(lister.next(&store, 2).await.unwrap().len(), 2);
        assert_eq!(lister.next(&store, 10).await.unwrap().len(), 3);
        assert_eq!(lister.next(&store, 10).await.unwrap().len(), 0);
        assert_eq!(lister.next(&store, 10).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_every_request_size_yields_each_entry_once() {
        let total = 23;
        for page in 1..=7u32 {
            for request in 1..=9usize {
                let store = store_with(total, 1000);
                let mut lister = DirLister::new("/dir", Some(page), 4);

                let mut seen = Vec::new();
                loop {
                    let batch = lister.next_names(&store, request).await.unwrap();
                    let done = batch.len() < request;
                    seen.extend(batch);
                    if done {
                        break;
                    }
                }

                assert_eq!(seen.len(), total, "page {} request {}", page, request);
                let unique: HashSet<&String> = seen.iter().collect();
                assert_eq!(unique.len(), total);
                let mut sorted = seen.clone();
                sorted.sort();
                assert_eq!(seen, sorted, "entries must keep store order");
            }
        }
    }

    #[tokio::test]
    async fn test_zero_request_fetches_nothing() {
        let store = store_with(3, 1000);
        let mut lister = DirLister::new("/dir", None, 16);
        assert!(lister.next(&store, 0).await.unwrap().is_empty());
        assert!(!lister.is_exhausted());
    }

    #[tokio::test]
    async fn test_missing_directory_is_list_failure() {
        let store = MemoryStore::new();
        let mut lister = DirLister::new("/missing", None, 16);
        let err = lister.next(&store, 10).await.unwrap_err();
        assert!(matches!(err, Error::ListFailed { ref path, .. } if path == "/missing"));
    }

    #[tokio::test]
    async fn test_names_are_leaf_names() {
        let store = store_with(2, 1000);
        let mut lister = DirLister::new("/dir", None, 16);
        let names = lister.next_names(&store, 10).await.unwrap();
        assert_eq!(names, vec!["entry_000", "entry_001"]);
    }
}
