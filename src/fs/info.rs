//! Cached metadata entry handed out by `stat` and directory listings.

use chrono::{DateTime, Utc};

use crate::api::types::Metadata;

/// Permission bits reported for every entry; the store has no permission model.
pub const SIMULATED_MODE: u32 = 0o777;

/// One file or folder description, built from a single store response item.
///
/// Folders report a size of 0 and the Unix epoch as modification time.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    meta: Metadata,
}

impl FileInfo {
    pub fn new(meta: Metadata) -> Self {
        Self { meta }
    }

    pub fn name(&self) -> &str {
        self.meta.name()
    }

    pub fn size(&self) -> u64 {
        match &self.meta {
            Metadata::File(file) => file.size,
            Metadata::Folder(_) => 0,
        }
    }

    pub fn mode(&self) -> u32 {
        SIMULATED_MODE
    }

    pub fn mod_time(&self) -> DateTime<Utc> {
        match &self.meta {
            Metadata::File(file) => file.client_modified,
            Metadata::Folder(_) => DateTime::UNIX_EPOCH,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.meta.is_folder()
    }

    /// The raw store metadata.
    pub fn sys(&self) -> &Metadata {
        &self.meta
    }

    pub fn into_inner(self) -> Metadata {
        self.meta
    }
}

impl From<Metadata> for FileInfo {
    fn from(meta: Metadata) -> Self {
        Self::new(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{FileMetadata, FolderMetadata};

    fn file(name: &str, size: u64) -> Metadata {
        Metadata::File(FileMetadata {
            name: name.to_string(),
            path_display: None,
            id: None,
            size,
            client_modified: "2015-05-12T15:50:38Z".parse().unwrap(),
            server_modified: None,
            rev: None,
        })
    }

    #[test]
    fn test_file_info_for_file() {
        let info = FileInfo::new(file("file1", 12));
        assert_eq!(info.name(), "file1");
        assert_eq!(info.size(), 12);
        assert!(!info.is_dir());
        assert_eq!(info.mode(), 0o777);
        assert_eq!(info.mod_time().to_rfc3339(), "2015-05-12T15:50:38+00:00");
        assert!(matches!(info.sys(), Metadata::File(_)));
    }

    #[test]
    fn test_file_info_for_folder_reports_zero_values() {
        let info = FileInfo::new(Metadata::Folder(FolderMetadata {
            name: "dir1".to_string(),
            path_display: Some("/dir1".to_string()),
            id: None,
        }));
        assert_eq!(info.name(), "dir1");
        assert_eq!(info.size(), 0);
        assert!(info.is_dir());
        assert_eq!(info.mod_time(), DateTime::<Utc>::UNIX_EPOCH);
    }
}
