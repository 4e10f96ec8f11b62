//! Background image fetching over HTTP(S) and from the local filesystem.
//!
//! `http`/`https` references go through a shared `reqwest` client;
//! `file://` references (what an image picker stores) and bare paths are
//! read from disk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use emojiart_core::{ArtError, ArtResult, ImageFetcher};
use reqwest::Client;
use thiserror::Error;
use url::Url;

/// Errors that can occur while fetching a background.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The reference uses a scheme we cannot fetch.
    #[error("unsupported reference scheme: {0}")]
    UnsupportedScheme(String),
    /// A `file://` URL did not map to a local path.
    #[error("invalid file reference: {0}")]
    InvalidFilePath(String),
    /// HTTP layer failed (connection, timeout, status).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Reading a local file failed.
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FetchError> for ArtError {
    fn from(e: FetchError) -> Self {
        Self::ResourceLoad(e.to_string())
    }
}

/// Fetcher for `http`, `https` and `file` references.
#[derive(Clone)]
pub struct HttpFetcher {
    inner: Arc<Client>,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher").finish_non_exhaustive()
    }
}

impl HttpFetcher {
    /// Create a fetcher whose HTTP requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client fails to build.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("emojiart/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            inner: Arc::new(http),
        })
    }

    async fn fetch_reference(&self, reference: &str) -> Result<Vec<u8>, FetchError> {
        let Ok(url) = Url::parse(reference) else {
            // Not a URL: treat as a local path
            return Ok(tokio::fs::read(reference).await?);
        };

        match url.scheme() {
            "http" | "https" => {
                tracing::debug!("GET {url}");
                let response = self.inner.get(url).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
            "file" => {
                let path: PathBuf = url
                    .to_file_path()
                    .map_err(|()| FetchError::InvalidFilePath(reference.to_string()))?;
                Ok(tokio::fs::read(path).await?)
            }
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, reference: &str) -> ArtResult<Vec<u8>> {
        self.fetch_reference(reference).await.map_err(ArtError::from)
    }
}
