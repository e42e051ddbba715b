//! File-backed binary object store for downloaded archives.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::Result;

/// Key-addressed persistent store for raw archive bytes.
///
/// One file per key under a root directory; keys may contain `/` and map to
/// subdirectories. Every operation opens what it needs and releases it before
/// returning, so the store has no open/close lifecycle of its own.
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    /// Suffix for in-progress writes, renamed into place on completion.
    const PART_SUFFIX: &'static str = ".part";

    /// Open (and create if needed) a store rooted at the given directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        debug!("opened object store at {:?}", root);
        Ok(Self { root })
    }

    /// The root directory backing this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid store key: {key:?}"),
            )
            .into());
        }
        Ok(self.root.join(key))
    }

    /// Store bytes under a key, replacing any previous object.
    ///
    /// The write lands in a `.part` sibling first and is renamed into place,
    /// so a concurrent reader sees either the old or the new object in full,
    /// never a partial mix.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut part = path.clone().into_os_string();
        part.push(Self::PART_SUFFIX);
        let part = PathBuf::from(part);

        trace!("writing {} bytes to store key {key}", bytes.len());
        tokio::fs::write(&part, bytes).await?;
        tokio::fs::rename(&part, &path).await?;

        Ok(())
    }

    /// Read the bytes stored under a key.
    ///
    /// An absent key is a normal outcome, not an error - callers distinguish
    /// "never downloaded" from "download failed".
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(key)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                trace!("read {} bytes from store key {key}", bytes.len());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a key is present in the store.
    pub async fn contains(&self, key: &str) -> bool {
        match self.object_path(key) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Keys of all objects currently present, in no particular order.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();

        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            // Leftover .part files are not objects.
            if entry.file_name().to_string_lossy().ends_with(Self::PART_SUFFIX) {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                keys.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }

        Ok(keys)
    }

    /// Delete the object stored under a key. Deleting an absent key is a
    /// no-op.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                trace!("deleted store key {key}");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
