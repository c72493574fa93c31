//! `RemoteStore` implementation over the HTTP files API.
//!
//! Uploads stream the handle's pipe as the request body, so the request stays
//! open for as long as the writer keeps writing and the store commits when
//! the body ends.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};

use super::client::{store_path, DropboxClient};
use super::types::{
    CommitInfo, FileMetadata, FolderMetadata, FolderResult, ListFolderArg, ListFolderContinueArg,
    ListFolderResult, Metadata, MetadataResult, PathArg, RelocationArg, WriteMode,
};
use super::{ByteStream, RemoteStore, UploadSource};
use crate::error::StoreError;

#[async_trait]
impl RemoteStore for DropboxClient {
    fn name(&self) -> &'static str {
        "dropbox"
    }

    async fn upload(
        &self,
        path: &str,
        mode: WriteMode,
        source: UploadSource,
    ) -> Result<Metadata, StoreError> {
        let arg = CommitInfo {
            path,
            mode,
            autorename: false,
            mute: false,
        };
        let body = reqwest::Body::wrap_stream(ReaderStream::new(source));

        let file: FileMetadata = self.content_upload("files/upload", &arg, body).await?;
        log::info!("Committed {} ({} bytes)", path, file.size);
        Ok(Metadata::File(file))
    }

    async fn download(&self, path: &str, start: Option<u64>) -> Result<ByteStream, StoreError> {
        let resp = self
            .content_download("files/download", &PathArg { path }, start)
            .await?;

        let stream = resp.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::pin(StreamReader::new(stream)))
    }

    async fn list_folder(
        &self,
        path: &str,
        limit: Option<u32>,
    ) -> Result<ListFolderResult, StoreError> {
        let arg = ListFolderArg {
            path: store_path(path),
            limit,
        };
        self.rpc("files/list_folder", &arg).await
    }

    async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderResult, StoreError> {
        self.rpc("files/list_folder/continue", &ListFolderContinueArg { cursor })
            .await
    }

    async fn get_metadata(&self, path: &str) -> Result<Metadata, StoreError> {
        self.rpc("files/get_metadata", &PathArg { path }).await
    }

    async fn delete(&self, path: &str) -> Result<Metadata, StoreError> {
        let result: MetadataResult = self.rpc("files/delete_v2", &PathArg { path }).await?;
        Ok(result.metadata)
    }

    async fn move_path(&self, from: &str, to: &str) -> Result<Metadata, StoreError> {
        let arg = RelocationArg {
            from_path: from,
            to_path: to,
            autorename: false,
        };
        let result: MetadataResult = self.rpc("files/move_v2", &arg).await?;
        Ok(result.metadata)
    }

    async fn create_folder(&self, path: &str) -> Result<FolderMetadata, StoreError> {
        let result: FolderResult = self
            .rpc("files/create_folder_v2", &PathArg { path })
            .await?;
        Ok(result.metadata)
    }
}
