//! Error types shared across the slidecache pipeline.

use thiserror::Error;

/// Result type for slidecache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the offline content pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Transient network failure (transport error, timeout, or non-404 HTTP
    /// status). Retriable by re-invoking the same call.
    #[error("network error fetching {url}: {reason}")]
    Network {
        /// The resolved URL that was being fetched
        url: String,
        /// Underlying transport or status description
        reason: String,
    },

    /// The remote resource does not exist at that locator. Distinct from a
    /// transient failure; not auto-retried.
    #[error("resource not found: {url}")]
    NotFound {
        /// The resolved URL that returned 404
        url: String,
    },

    /// Malformed or truncated zip data. Permanent for that byte sequence;
    /// re-downloading the archive is the only remedy.
    #[error("corrupt archive: {0} (try re-downloading the presentation)")]
    CorruptArchive(String),

    /// A well-formed archive containing no HTML document to play.
    #[error("archive contains no playable HTML document")]
    NoEntryPoint,

    /// Local persistence failure.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// The catalog manifest could not be parsed.
    #[error("malformed catalog manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    /// A playback resolution is already in flight.
    #[error("another presentation is already being prepared")]
    Busy,
}
