use std::io::Read;

use flate2::read::DeflateDecoder;
use tracing::trace;

use crate::error::{Error, Result};

use super::parser;
use super::structures::{ArchiveEntry, CompressionMethod};

/// An opened zip archive over an in-memory byte buffer.
///
/// Opening parses the central directory up front; entry payloads stay
/// compressed in the buffer and are decompressed lazily on first read, so
/// archives with many unused assets never pay full decompression cost.
#[derive(Debug)]
pub struct ZipArchive {
    data: Vec<u8>,
    entries: Vec<ArchiveEntry>,
}

impl ZipArchive {
    /// Open a zip archive from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptArchive`] if the central directory is
    /// unreadable - a truncated buffer never yields a silent empty list.
    pub fn open(data: Vec<u8>) -> Result<Self> {
        let entries = parser::list_entries(&data)?;
        trace!("opened archive: {} entries", entries.len());
        Ok(Self { data, entries })
    }

    /// File entries in archive order, directories excluded.
    ///
    /// This is the listing used for document and asset discovery.
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(|e| !e.is_directory)
    }

    /// Look up an entry by exact, case-sensitive path.
    pub fn entry(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| !e.is_directory && e.path == path)
    }

    /// Read and decompress an entry's bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptArchive`] if the entry is absent, uses an
    /// unsupported compression method, or the decompressed output fails the
    /// size or CRC check.
    pub fn read_binary(&self, path: &str) -> Result<Vec<u8>> {
        let entry = self
            .entry(path)
            .ok_or_else(|| Error::CorruptArchive(format!("no such entry: {path}")))?
            .clone();

        let start = parser::data_offset(&self.data, &entry)? as usize;
        let end = start
            .checked_add(entry.compressed_size as usize)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::CorruptArchive(format!("entry data out of range: {path}")))?;

        let compressed = &self.data[start..end];

        let bytes = match entry.compression_method {
            CompressionMethod::Stored => compressed.to_vec(),
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                DeflateDecoder::new(compressed)
                    .read_to_end(&mut out)
                    .map_err(|e| Error::CorruptArchive(format!("inflate failed: {e}")))?;
                out
            }
            CompressionMethod::Unknown(m) => {
                return Err(Error::CorruptArchive(format!(
                    "unsupported compression method {m} for {path}"
                )));
            }
        };

        if bytes.len() as u64 != entry.uncompressed_size {
            return Err(Error::CorruptArchive(format!(
                "size mismatch for {path}: expected {}, got {}",
                entry.uncompressed_size,
                bytes.len()
            )));
        }

        if crc32fast::hash(&bytes) != entry.crc32 {
            return Err(Error::CorruptArchive(format!("CRC mismatch for {path}")));
        }

        trace!("read entry {path}: {} bytes", bytes.len());
        Ok(bytes)
    }

    /// Read an entry as text using permissive decoding.
    ///
    /// Byte sequences that are not valid UTF-8 are replaced rather than
    /// failing the whole operation.
    pub fn read_text(&self, path: &str) -> Result<String> {
        let bytes = self.read_binary(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
