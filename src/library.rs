//! Orchestration layer tying fetcher, store, and resolver together.
//!
//! Owns the per-item state machine and the whole-percent progress
//! de-duplication; the core components below it stay policy-free.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::catalog::{self, CatalogEntry, ItemState};
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::resolve::{PlaybackGate, PlaybackSession, Resolver};
use crate::store::ObjectStore;
use crate::zip::ZipArchive;

/// Collapses byte progress into monotone whole-percent steps.
///
/// Duplicate percentages are suppressed and values never decrease, bounding
/// update frequency without touching the underlying callback contract.
#[derive(Default)]
pub struct PercentTracker {
    last: Option<u8>,
}

impl PercentTracker {
    pub fn update(&mut self, received: u64, total: u64) -> Option<u8> {
        // The fetcher's completion callback reports received == total, which
        // for a zero-byte body is (0, 0) - still a finished download.
        let pct = if received == total {
            100
        } else if total > 0 {
            ((received * 100) / total).min(100) as u8
        } else if received > 0 {
            100
        } else {
            0
        };

        if self.last.is_some_and(|last| pct <= last) {
            return None;
        }
        self.last = Some(pct);
        Some(pct)
    }
}

/// Strip relative-current-directory markers off a catalog key.
///
/// Manifests may spell a key as `./demo.zip`; the fetcher already tolerates
/// the marker when resolving the URL, and the store key must land on the
/// same object either way.
fn store_key(mut key: &str) -> &str {
    while let Some(stripped) = key.strip_prefix("./") {
        key = stripped;
    }
    key
}

/// The offline presentation library: catalog access, downloads, local
/// storage, and playback resolution behind one handle.
pub struct Library {
    fetcher: Fetcher,
    store: ObjectStore,
    resolver: Resolver,
    states: Mutex<HashMap<String, ItemState>>,
}

impl Library {
    /// Open a library against a catalog base URL and a local store
    /// directory.
    pub async fn open(base_url: impl Into<String>, store_dir: impl Into<PathBuf>) -> Result<Self> {
        let fetcher = Fetcher::new(base_url)?;
        let store = ObjectStore::open(store_dir).await?;
        let resolver = Resolver::new(PlaybackGate::new());

        Ok(Self {
            fetcher,
            store,
            resolver,
            states: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch the remote catalog. No local fallback when unreachable.
    pub async fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        catalog::fetch_catalog(&self.fetcher).await
    }

    /// Current status of an item, consulting the store for keys this
    /// process has not touched yet.
    pub async fn status(&self, key: &str) -> ItemState {
        let key = store_key(key);
        if let Some(state) = self.state_map().get(key) {
            return *state;
        }
        if self.store.contains(key).await {
            ItemState::Ready
        } else {
            ItemState::Remote
        }
    }

    fn state_map(&self) -> std::sync::MutexGuard<'_, HashMap<String, ItemState>> {
        // A poisoned map still holds valid states; keep going.
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, key: &str, state: ItemState) {
        self.state_map().insert(store_key(key).to_string(), state);
    }

    /// Download an archive and persist it under its catalog key.
    ///
    /// `on_percent` receives strictly increasing whole percentages ending at
    /// 100. On failure the item reverts to its pre-download status, so retry
    /// is always possible; an already-stored object is left intact.
    pub async fn download(&self, key: &str, on_percent: &mut dyn FnMut(u8)) -> Result<()> {
        let previous = self.status(key).await;
        self.set_state(key, ItemState::Downloading);

        let mut tracker = PercentTracker::default();
        let mut forward = |received: u64, total: u64| {
            if let Some(pct) = tracker.update(received, total) {
                on_percent(pct);
            }
        };

        let result = async {
            let bytes = self.fetcher.fetch_with_progress(key, &mut forward).await?;
            self.store.put(store_key(key), &bytes).await?;
            Ok(())
        }
        .await;

        match &result {
            Ok(()) => self.set_state(key, ItemState::Ready),
            Err(e) => {
                warn!("download of {key} failed: {e}");
                let reverted = if previous == ItemState::Ready {
                    ItemState::Ready
                } else {
                    ItemState::Failed
                };
                self.set_state(key, reverted);
            }
        }

        result
    }

    /// Open the stored archive for a catalog entry and resolve it into a
    /// playback session.
    ///
    /// Missing local data reverts the item to not-yet-downloaded instead of
    /// leaving it stuck "ready but unplayable".
    pub async fn play(&self, entry: &CatalogEntry) -> Result<PlaybackSession> {
        let key = store_key(&entry.key);
        let Some(bytes) = self.store.get(key).await? else {
            self.set_state(key, ItemState::Remote);
            return Err(Error::NotFound {
                url: entry.key.clone(),
            });
        };

        let archive = ZipArchive::open(bytes)?;
        let session = self.resolver.resolve(&archive, &entry.title)?;

        debug!("playing {}: {} handles", entry.key, session.handles().len());
        Ok(session)
    }

    /// Delete a stored archive and reset its status.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = store_key(key);
        self.store.delete(key).await?;
        self.set_state(key, ItemState::Remote);
        Ok(())
    }

    /// Keys currently present in the local store.
    pub fn stored_keys(&self) -> Result<Vec<String>> {
        self.store.keys()
    }
}
