//! Configuration for the filesystem facade and the HTTP store client.
//!
//! Both structs are plain values passed at construction time. `from_env()`
//! reads the process environment; the binary loads `.env` first.

use std::time::Duration;

/// Default listing buffer size, one full page of the store's largest page.
pub const DIR_LISTING_MAX_LIMIT: usize = 2000;

/// Default capacity of the in-process pipe feeding an upload (64 KiB).
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

const DEFAULT_API_URL: &str = "https://api.dropboxapi.com";
const DEFAULT_CONTENT_URL: &str = "https://content.dropboxapi.com";

/// Settings shared by every handle created from one [`crate::Fs`].
#[derive(Debug, Clone, PartialEq)]
pub struct FsConfig {
    /// Prefix joined in front of every path given to the facade.
    pub root: String,
    /// Page size requested from the store when listing. `None` uses the
    /// store's default.
    pub dir_list_limit: Option<u32>,
    /// Bytes buffered between `write` calls and the background upload.
    pub pipe_capacity: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            root: "/".to_string(),
            dir_list_limit: None,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
        }
    }
}

impl FsConfig {
    /// Read `DROPFS_ROOT`, `DROPFS_DIR_LIST_LIMIT` and `DROPFS_PIPE_CAPACITY`.
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root: std::env::var("DROPFS_ROOT").unwrap_or(defaults.root),
            dir_list_limit: parse_env("DROPFS_DIR_LIST_LIMIT").or(defaults.dir_list_limit),
            pipe_capacity: parse_env("DROPFS_PIPE_CAPACITY")
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.pipe_capacity),
        }
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_dir_list_limit(mut self, limit: u32) -> Self {
        self.dir_list_limit = Some(limit);
        self
    }

    pub fn with_pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity.max(1);
        self
    }

    /// Capacity of a handle's listing buffer: at least one full page.
    pub fn dir_buffer_capacity(&self) -> usize {
        let page = self.dir_list_limit.unwrap_or(0) as usize;
        page.max(DIR_LISTING_MAX_LIMIT)
    }
}

/// Connection settings for [`crate::api::DropboxClient`].
#[derive(Debug, Clone)]
pub struct DropboxConfig {
    /// OAuth bearer token.
    pub token: Option<String>,
    /// Base URL of the RPC endpoints.
    pub api_url: String,
    /// Base URL of the content (upload/download) endpoints.
    pub content_url: String,
    /// Connect timeout. Transfers themselves are not bounded: an upload
    /// lasts as long as its writer keeps the handle open.
    pub connect_timeout: Duration,
}

impl Default for DropboxConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            content_url: DEFAULT_CONTENT_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl DropboxConfig {
    /// Read `DROPBOX_TOKEN`, `DROPBOX_API_URL` and `DROPBOX_CONTENT_URL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token: std::env::var("DROPBOX_TOKEN").ok().filter(|t| !t.is_empty()),
            api_url: std::env::var("DROPBOX_API_URL").unwrap_or(defaults.api_url),
            content_url: std::env::var("DROPBOX_CONTENT_URL").unwrap_or(defaults.content_url),
            connect_timeout: defaults.connect_timeout,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FsConfig::default();
        assert_eq!(config.root, "/");
        assert_eq!(config.dir_list_limit, None);
        assert_eq!(config.pipe_capacity, DEFAULT_PIPE_CAPACITY);
    }

    #[test]
    fn test_dir_buffer_holds_a_full_page() {
        let config = FsConfig::default().with_dir_list_limit(2);
        assert_eq!(config.dir_buffer_capacity(), DIR_LISTING_MAX_LIMIT);

        let config = FsConfig::default().with_dir_list_limit(5000);
        assert_eq!(config.dir_buffer_capacity(), 5000);
    }

    #[test]
    fn test_pipe_capacity_never_zero() {
        let config = FsConfig::default().with_pipe_capacity(0);
        assert_eq!(config.pipe_capacity, 1);
    }
}
