//! Request and response types for the remote store API.
//!
//! Field names follow the store's snake_case JSON format. Metadata entries
//! are discriminated by the `.tag` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Description of one file in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub size: u64,
    pub client_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}

/// Description of one folder in the store. Folders carry no size or time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One metadata lookup or listing result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum Metadata {
    File(FileMetadata),
    Folder(FolderMetadata),
}

impl Metadata {
    pub fn name(&self) -> &str {
        match self {
            Metadata::File(file) => &file.name,
            Metadata::Folder(folder) => &folder.name,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Metadata::Folder(_))
    }
}

/// One page of a folder listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFolderResult {
    pub entries: Vec<Metadata>,
    /// Opaque token for `list_folder/continue`.
    pub cursor: String,
    pub has_more: bool,
}

/// How an upload treats an existing object at the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Fail with a conflict if the path exists.
    Add,
    Overwrite,
}

/// Argument of `files/upload`, sent in the `Dropbox-API-Arg` header.
#[derive(Debug, Serialize)]
pub struct CommitInfo<'a> {
    pub path: &'a str,
    pub mode: WriteMode,
    pub autorename: bool,
    pub mute: bool,
}

/// Single-path argument used by download, get_metadata, delete and create_folder.
#[derive(Debug, Serialize)]
pub struct PathArg<'a> {
    pub path: &'a str,
}

/// Argument of `files/list_folder`.
#[derive(Debug, Serialize)]
pub struct ListFolderArg<'a> {
    pub path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Argument of `files/list_folder/continue`.
#[derive(Debug, Serialize)]
pub struct ListFolderContinueArg<'a> {
    pub cursor: &'a str,
}

/// Argument of `files/move_v2`.
#[derive(Debug, Serialize)]
pub struct RelocationArg<'a> {
    pub from_path: &'a str,
    pub to_path: &'a str,
    pub autorename: bool,
}

/// Response wrapper of the `_v2` mutation endpoints.
#[derive(Debug, Deserialize)]
pub struct MetadataResult {
    pub metadata: Metadata,
}

/// Response wrapper of `files/create_folder_v2`.
#[derive(Debug, Deserialize)]
pub struct FolderResult {
    pub metadata: FolderMetadata,
}

/// Error body returned by the store for failed calls.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error_summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_list_folder_result() {
        let body = r#"{
            "entries": [
                {".tag": "folder", "name": "photos", "path_display": "/photos", "id": "id:a"},
                {".tag": "file", "name": "a.txt", "id": "id:b", "size": 12,
                 "client_modified": "2015-05-12T15:50:38Z",
                 "server_modified": "2015-05-12T15:50:38Z", "rev": "a1c10ce0dd78"}
            ],
            "cursor": "ZtkX9_EHj3x7PMkVuFIhwKYXEpwpLwyxp9vMKomUhllil9q7eWiAu",
            "has_more": false
        }"#;

        let result: ListFolderResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.entries.len(), 2);
        assert!(result.entries[0].is_folder());
        assert_eq!(result.entries[0].name(), "photos");
        match &result.entries[1] {
            Metadata::File(file) => {
                assert_eq!(file.size, 12);
                assert_eq!(file.rev.as_deref(), Some("a1c10ce0dd78"));
            }
            other => panic!("expected a file, got {other:?}"),
        }
        assert!(!result.has_more);
    }

    #[test]
    fn test_write_mode_serializes_as_tag() {
        let arg = CommitInfo {
            path: "/a.txt",
            mode: WriteMode::Overwrite,
            autorename: false,
            mute: false,
        };
        let json = serde_json::to_string(&arg).unwrap();
        assert_eq!(
            json,
            r#"{"path":"/a.txt","mode":"overwrite","autorename":false,"mute":false}"#
        );
    }

    #[test]
    fn test_list_folder_arg_omits_missing_limit() {
        let json = serde_json::to_string(&ListFolderArg { path: "", limit: None }).unwrap();
        assert_eq!(json, r#"{"path":""}"#);
    }
}
