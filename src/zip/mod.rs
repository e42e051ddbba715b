//! Zip archive parsing and extraction.
//!
//! ## Architecture
//!
//! The module is organized into three components:
//!
//! - [`structures`]: Data structures for zip format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of zip structures from raw bytes
//! - [`archive`]: The [`ZipArchive`] handle used by the rest of the pipeline
//!
//! ## Zip Format Overview
//!
//! A zip file consists of:
//! 1. Local file headers and compressed data for each entry
//! 2. Central Directory with metadata for all entries
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The EOCD is read first (from the end of the buffer), then the Central
//! Directory, so entries can be listed without touching any payload bytes.
//! Payloads are decompressed lazily, one entry at a time, on first read.
//!
//! ## Supported Features
//!
//! - Standard zip format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for archives > 4GB
//! - STORED (no compression) method
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod archive;
mod parser;
mod structures;

pub use archive::ZipArchive;
pub use structures::{ArchiveEntry, CompressionMethod};
