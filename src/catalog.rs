//! Catalog manifest model and per-item status.

use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::fetch::Fetcher;

/// Well-known manifest path relative to the configured base location.
pub const MANIFEST_PATH: &str = "catalog.json";

/// Raw manifest element as served by the remote catalog.
#[derive(Debug, Deserialize)]
struct ManifestRecord {
    file: String,
    id: Option<String>,
    title: Option<String>,
    size: Option<String>,
    thumbnail: Option<String>,
}

/// One presentation in the catalog.
///
/// `key` doubles as the remote resource locator and the store key.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: String,
    pub key: String,
    pub title: String,
    pub size_label: String,
    pub thumbnail: Option<String>,
}

impl From<ManifestRecord> for CatalogEntry {
    fn from(record: ManifestRecord) -> Self {
        // Missing id/title fall back to the file value, missing size to a
        // literal "Unknown".
        Self {
            id: record.id.unwrap_or_else(|| record.file.clone()),
            title: record.title.unwrap_or_else(|| record.file.clone()),
            size_label: record.size.unwrap_or_else(|| "Unknown".to_string()),
            thumbnail: record.thumbnail,
            key: record.file,
        }
    }
}

/// Closed per-item status, driven only by fetcher/store/resolver outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemState {
    /// Known from the catalog, not downloaded.
    #[default]
    Remote,
    /// A download is in flight.
    Downloading,
    /// Stored locally and playable.
    Ready,
    /// The last download attempt failed; retry is possible.
    Failed,
}

/// Fetch and parse the catalog manifest.
///
/// # Errors
///
/// Network/not-found errors from the fetch, or [`crate::Error::Manifest`]
/// when the JSON is malformed. There is no fallback to a locally
/// reconstructed list when the manifest is unreachable.
pub async fn fetch_catalog(fetcher: &Fetcher) -> Result<Vec<CatalogEntry>> {
    let bytes = fetcher.fetch(MANIFEST_PATH).await?;
    let records: Vec<ManifestRecord> = serde_json::from_slice(&bytes)?;

    debug!("catalog: {} entries", records.len());
    Ok(records.into_iter().map(CatalogEntry::from).collect())
}
