use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{Error, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::CorruptArchive(
                "invalid end of central directory".to_string(),
            ));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: read_u16(&mut cursor)?,
            disk_with_cd: read_u16(&mut cursor)?,
            disk_entries: read_u16(&mut cursor)?,
            total_entries: read_u16(&mut cursor)?,
            cd_size: read_u32(&mut cursor)?,
            cd_offset: read_u32(&mut cursor)?,
            comment_len: read_u16(&mut cursor)?,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::CorruptArchive("invalid ZIP64 locator".to_string()));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: read_u32(&mut cursor)?,
            eocd64_offset: read_u64(&mut cursor)?,
            total_disks: read_u32(&mut cursor)?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::CorruptArchive(
                "invalid ZIP64 end of central directory".to_string(),
            ));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: read_u64(&mut cursor)?,
            version_made_by: read_u16(&mut cursor)?,
            version_needed: read_u16(&mut cursor)?,
            disk_number: read_u32(&mut cursor)?,
            disk_with_cd: read_u32(&mut cursor)?,
            disk_entries: read_u64(&mut cursor)?,
            total_entries: read_u64(&mut cursor)?,
            cd_size: read_u64(&mut cursor)?,
            cd_offset: read_u64(&mut cursor)?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Metadata for a single archive entry, produced transiently per open archive.
///
/// `path` is normalized to forward-slash separators. The compressed payload
/// stays in the archive buffer until first read (lazy decompression).
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub is_directory: bool,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
}

// Truncated headers are a corruption symptom, not an IO concern.
fn truncated(_: std::io::Error) -> Error {
    Error::CorruptArchive("truncated header".to_string())
}

pub(super) fn read_u16<R: std::io::Read>(r: &mut R) -> Result<u16> {
    r.read_u16::<LittleEndian>().map_err(truncated)
}

pub(super) fn read_u32<R: std::io::Read>(r: &mut R) -> Result<u32> {
    r.read_u32::<LittleEndian>().map_err(truncated)
}

pub(super) fn read_u64<R: std::io::Read>(r: &mut R) -> Result<u64> {
    r.read_u64::<LittleEndian>().map_err(truncated)
}
