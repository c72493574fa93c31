//! HTTP client for the store API with bearer auth injection.
//!
//! RPC endpoints take a JSON body. Content endpoints (upload, download) carry
//! their JSON argument in the `Dropbox-API-Arg` header and the file bytes in
//! the request or response body.

use reqwest::{Body, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::ApiErrorBody;
use crate::config::DropboxConfig;
use crate::error::StoreError;

/// Header carrying the JSON argument of content endpoints.
const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// HTTP client wrapper for the store API.
///
/// Cheap to share behind an `Arc`: every upload task and read stream of every
/// handle goes through the same connection pool.
pub struct DropboxClient {
    client: Client,
    api_url: String,
    content_url: String,
    access_token: Option<String>,
}

impl DropboxClient {
    pub fn new(config: &DropboxConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            content_url: config.content_url.trim_end_matches('/').to_string(),
            access_token: config.token.clone(),
        }
    }

    /// Attach the bearer token, when one is configured.
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Call an RPC endpoint (`/2/<endpoint>`) with a JSON argument.
    pub(crate) async fn rpc<A, R>(&self, endpoint: &str, arg: &A) -> Result<R, StoreError>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/2/{}", self.api_url, endpoint);
        log::debug!("rpc {}", endpoint);

        let builder = self.authorize(self.client.post(&url).json(arg));

        let resp = check_status(builder.send().await?).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Call a content-upload endpoint, streaming `body` as the request body.
    pub(crate) async fn content_upload<A, R>(
        &self,
        endpoint: &str,
        arg: &A,
        body: Body,
    ) -> Result<R, StoreError>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/2/{}", self.content_url, endpoint);
        log::debug!("content upload {}", endpoint);

        let builder = self.authorize(
            self.client
                .post(&url)
                .header(API_ARG_HEADER, api_arg_header(arg)?)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(body),
        );

        let resp = check_status(builder.send().await?).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Call a content-download endpoint. The returned response body is the
    /// file content, starting at `start` when a byte range is requested.
    pub(crate) async fn content_download<A>(
        &self,
        endpoint: &str,
        arg: &A,
        start: Option<u64>,
    ) -> Result<Response, StoreError>
    where
        A: Serialize + ?Sized,
    {
        let url = format!("{}/2/{}", self.content_url, endpoint);
        log::debug!("content download {} (start: {:?})", endpoint, start);

        let mut builder = self
            .client
            .post(&url)
            .header(API_ARG_HEADER, api_arg_header(arg)?);
        if let Some(offset) = start.filter(|offset| *offset > 0) {
            builder = builder.header(reqwest::header::RANGE, format!("bytes={}-", offset));
        }

        check_status(self.authorize(builder).send().await?).await
    }
}

/// Turn a non-success response into a `StoreError::Api`, extracting the
/// structured error summary when the body carries one.
async fn check_status(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::api(status.as_u16(), error_summary(&body)))
}

fn error_summary(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error_summary,
        Err(_) => body.trim().to_string(),
    }
}

/// Serialize an argument for the `Dropbox-API-Arg` header. HTTP headers must
/// be ASCII, so every other character is written as a JSON `\u` escape.
pub(crate) fn api_arg_header<A: Serialize + ?Sized>(arg: &A) -> Result<String, StoreError> {
    let json = serde_json::to_string(arg)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(out)
}

/// Map an absolute path to the store's addressing: the root folder is the
/// empty string, everything else keeps its leading slash.
pub(crate) fn store_path(path: &str) -> &str {
    if path == "/" {
        ""
    } else {
        path
    }
}
