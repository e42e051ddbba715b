//! Streaming HTTP fetcher with byte-level progress reporting.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Byte-progress callback: `(received, total)`. `total` is `0` when the
/// transport does not expose a size.
pub type ProgressFn<'a> = &'a mut dyn FnMut(u64, u64);

/// Retrieves remote resources relative to a configured base location.
pub struct Fetcher {
    client: Client,
    base_url: String,
}

impl Fetcher {
    /// Create a fetcher for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Network {
                url: base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self { client, base_url })
    }

    /// Resolve a resource path against the base location.
    ///
    /// Absolute `http(s)` URIs pass through verbatim. Otherwise trailing
    /// separators are stripped from the base and leading separators and `./`
    /// markers from the path, joined with exactly one separator.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let base = self.base_url.trim_end_matches('/');
        let mut rel = path;
        loop {
            if let Some(stripped) = rel.strip_prefix("./") {
                rel = stripped;
            } else if let Some(stripped) = rel.strip_prefix('/') {
                rel = stripped;
            } else {
                break;
            }
        }

        format!("{base}/{rel}")
    }

    /// Fetch a resource, discarding progress information.
    pub async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        self.fetch_with_progress(path, &mut |_, _| {}).await
    }

    /// Fetch a resource, reporting incremental byte progress.
    ///
    /// `on_progress(received, total)` is invoked as chunks arrive, with
    /// `received` never decreasing, and once more at completion with
    /// `received == total == full length`. On failure no bytes are returned
    /// and anything partially received is discarded.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for a 404 response, [`Error::Network`] for any
    /// other status or transport failure.
    pub async fn fetch_with_progress(
        &self,
        path: &str,
        on_progress: ProgressFn<'_>,
    ) -> Result<Vec<u8>> {
        let url = self.resolve_url(path);
        debug!("fetching {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound { url });
        }
        if !status.is_success() {
            return Err(Error::Network {
                url,
                reason: format!("HTTP status {status}"),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let mut body = Vec::with_capacity(total as usize);

        // Chunks are appended in arrival order; no fixed chunk size is
        // assumed.
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Network {
                url: url.clone(),
                reason: e.to_string(),
            })?;
            body.extend_from_slice(&chunk);
            on_progress(body.len() as u64, total);
        }

        // Guaranteed completion callback, even if the body was empty or no
        // mid-stream events were delivered.
        let len = body.len() as u64;
        on_progress(len, len);

        trace!("fetched {url}: {len} bytes");
        Ok(body)
    }
}
