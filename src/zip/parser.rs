//! Low-level zip central-directory parser.
//!
//! ## Parsing Strategy
//!
//! Zip files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the buffer's end
//! 2. If ZIP64, read the ZIP64 EOCD for large archive support
//! 3. Read the Central Directory to get metadata for all entries
//! 4. For extraction, read each entry's Local File Header and data
//!
//! Only the central directory is walked up front; entry payloads are left
//! compressed in place until first read.

use std::io::{Cursor, Read};

use crate::error::{Error, Result};

use super::structures::*;

/// Maximum zip comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: usize = 65535;

/// Find and parse the End of Central Directory record.
///
/// The EOCD is located at the end of the archive. Handles both the simple
/// case (no comment) and archives with comments by searching backwards for
/// the signature.
///
/// # Errors
///
/// Returns [`Error::CorruptArchive`] if no valid EOCD can be found,
/// indicating the buffer is not a valid zip archive.
pub fn find_eocd(data: &[u8]) -> Result<(EndOfCentralDirectory, u64)> {
    // Try the simple case first: EOCD flush with the end, no comment.
    if data.len() >= EndOfCentralDirectory::SIZE {
        let offset = data.len() - EndOfCentralDirectory::SIZE;
        let tail = &data[offset..];

        if &tail[0..4] == EndOfCentralDirectory::SIGNATURE && &tail[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(tail)?;
            return Ok((eocd, offset as u64));
        }
    }

    // EOCD not at the expected location - there may be a trailing comment.
    // Search backwards through the maximum comment window.
    let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE).min(data.len());
    let search_start = data.len() - search_size;
    let window = &data[search_start..];

    for i in (0..window.len().saturating_sub(EndOfCentralDirectory::SIZE)).rev() {
        if &window[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
            // Candidate EOCD - the comment length field must account for
            // exactly the bytes remaining after the record.
            let comment_len = u16::from_le_bytes([window[i + 20], window[i + 21]]) as usize;

            if comment_len == window.len() - i - EndOfCentralDirectory::SIZE {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&window[i..i + EndOfCentralDirectory::SIZE])?;
                return Ok((eocd, (search_start + i) as u64));
            }
        }
    }

    Err(Error::CorruptArchive(
        "no end of central directory record".to_string(),
    ))
}

/// Read the ZIP64 End of Central Directory record.
///
/// Called when the regular EOCD carries ZIP64 sentinel values (0xFFFF /
/// 0xFFFFFFFF). The ZIP64 EOCD Locator sits immediately before the regular
/// EOCD and points at the ZIP64 EOCD itself.
pub fn read_zip64_eocd(data: &[u8], eocd_offset: u64) -> Result<Zip64EOCD> {
    let locator_offset = (eocd_offset as usize)
        .checked_sub(Zip64EOCDLocator::SIZE)
        .ok_or_else(|| Error::CorruptArchive("missing ZIP64 locator".to_string()))?;

    let locator = Zip64EOCDLocator::from_bytes(&data[locator_offset..eocd_offset as usize])?;

    let eocd64_start = locator.eocd64_offset as usize;
    let eocd64_end = eocd64_start
        .checked_add(Zip64EOCD::MIN_SIZE)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| Error::CorruptArchive("ZIP64 record out of range".to_string()))?;

    Zip64EOCD::from_bytes(&data[eocd64_start..eocd64_end])
}

/// Walk the central directory and return metadata for every entry.
///
/// Entry paths are normalized to forward-slash separators. Directory entries
/// are included here; higher layers filter them out for discovery.
///
/// # Errors
///
/// Returns [`Error::CorruptArchive`] if the central directory is unreadable,
/// lies outside the buffer, or an entry header is malformed.
pub fn list_entries(data: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let (eocd, eocd_offset) = find_eocd(data)?;

    let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
        let eocd64 = read_zip64_eocd(data, eocd_offset)?;
        (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
    } else {
        (
            eocd.cd_offset as u64,
            eocd.cd_size as u64,
            eocd.total_entries as u64,
        )
    };

    // The declared count is untrusted; a central directory of cd_size bytes
    // cannot hold more than cd_size / CDFH_MIN_SIZE entries, so anything
    // larger is corruption, not a reason to allocate.
    if total_entries > cd_size / CDFH_MIN_SIZE as u64 {
        return Err(Error::CorruptArchive(format!(
            "entry count {total_entries} exceeds central directory size {cd_size}"
        )));
    }

    let cd_start = cd_offset as usize;
    let cd_end = cd_start
        .checked_add(cd_size as usize)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| Error::CorruptArchive("central directory out of range".to_string()))?;

    let cd_data = &data[cd_start..cd_end];

    let mut entries = Vec::with_capacity(total_entries as usize);
    let mut cursor = Cursor::new(cd_data);

    for _ in 0..total_entries {
        entries.push(parse_cdfh(&mut cursor)?);
    }

    Ok(entries)
}

/// Parse one Central Directory File Header from the cursor.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ArchiveEntry> {
    // Verify the signature (PK\x01\x02)
    let mut sig = [0u8; 4];
    cursor
        .read_exact(&mut sig)
        .map_err(|_| Error::CorruptArchive("truncated central directory".to_string()))?;
    if sig != CDFH_SIGNATURE {
        return Err(Error::CorruptArchive(
            "invalid central directory file header".to_string(),
        ));
    }

    let _version_made_by = read_u16(cursor)?;
    let _version_needed = read_u16(cursor)?;
    let _flags = read_u16(cursor)?;
    let compression_method = read_u16(cursor)?;
    let _last_mod_time = read_u16(cursor)?;
    let _last_mod_date = read_u16(cursor)?;
    let crc32 = read_u32(cursor)?;
    let mut compressed_size = read_u32(cursor)? as u64;
    let mut uncompressed_size = read_u32(cursor)? as u64;
    let file_name_length = read_u16(cursor)?;
    let extra_field_length = read_u16(cursor)?;
    let file_comment_length = read_u16(cursor)?;
    let _disk_number_start = read_u16(cursor)?;
    let _internal_attrs = read_u16(cursor)?;
    let _external_attrs = read_u32(cursor)?;
    let mut lfh_offset = read_u32(cursor)? as u64;

    // Variable-length file name; lossy conversion tolerates non-UTF8 names.
    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor
        .read_exact(&mut file_name_bytes)
        .map_err(|_| Error::CorruptArchive("truncated entry name".to_string()))?;
    let path = String::from_utf8_lossy(&file_name_bytes).replace('\\', "/");

    let is_directory = path.ends_with('/');

    // ZIP64 extended information lives in extra field ID 0x0001; fields are
    // present only when the corresponding header field is saturated.
    let extra_field_end = cursor.position() + extra_field_length as u64;

    while cursor.position() + 4 <= extra_field_end {
        let header_id = read_u16(cursor)?;
        let field_size = read_u16(cursor)?;

        if header_id == 0x0001 {
            if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                uncompressed_size = read_u64(cursor)?;
            }
            if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                compressed_size = read_u64(cursor)?;
            }
            if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                lfh_offset = read_u64(cursor)?;
            }
            // Skip any remaining ZIP64 fields (disk number start)
            let remaining = extra_field_end.saturating_sub(cursor.position());
            cursor.set_position(cursor.position() + remaining);
        } else {
            cursor.set_position(cursor.position() + field_size as u64);
        }
    }

    cursor.set_position(extra_field_end);

    // Skip over the file comment (unused)
    cursor.set_position(cursor.position() + file_comment_length as u64);

    Ok(ArchiveEntry {
        path,
        is_directory,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
    })
}

/// Compute the offset where an entry's compressed payload begins.
///
/// The Local File Header has its own variable-length name and extra field,
/// which may differ from the central directory copy, so the LFH must be read
/// to find the data start.
pub fn data_offset(data: &[u8], entry: &ArchiveEntry) -> Result<u64> {
    let lfh_start = entry.lfh_offset as usize;
    let lfh_end = lfh_start
        .checked_add(LFH_SIZE)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| Error::CorruptArchive("local header out of range".to_string()))?;

    let lfh = &data[lfh_start..lfh_end];
    if &lfh[0..4] != LFH_SIGNATURE {
        return Err(Error::CorruptArchive(
            "invalid local file header".to_string(),
        ));
    }

    // Name and extra lengths sit at fixed offsets 26 and 28 in the LFH.
    let file_name_length = u16::from_le_bytes([lfh[26], lfh[27]]) as u64;
    let extra_field_length = u16::from_le_bytes([lfh[28], lfh[29]]) as u64;

    Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
}
