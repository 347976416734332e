use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::error::ArchiveError;

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

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: [u8; 4] = *b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Signatures that end the run of local entries in a stream.
pub const CDFH_SIGNATURE: [u8; 4] = *b"PK\x01\x02";
pub const EOCD_SIGNATURE: [u8; 4] = *b"PK\x05\x06";
pub const ZIP64_EOCD_SIGNATURE: [u8; 4] = *b"PK\x06\x06";

/// Optional signature in front of a data descriptor
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

const FLAG_ENCRYPTED: u16 = 0x0001;
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Whether an entry is a directory marker or carries file data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// One entry as announced by its local file header.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub kind: EntryKind,
    pub compression_method: CompressionMethod,
    pub flags: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Sizes came from a ZIP64 extra field, so a trailing data descriptor
    /// carries 64-bit sizes as well.
    pub zip64: bool,
}

impl ArchiveEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// CRC and sizes follow the data instead of living in the header.
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Parse the fixed part of a local file header plus its name and extra
    /// field. `fixed` holds the 30 header bytes, signature included.
    pub fn from_local_header<R: Read>(fixed: &[u8; LFH_SIZE], rest: &mut R) -> Result<Self, ArchiveError> {
        let mut cursor = Cursor::new(&fixed[4..]);

        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        rest.read_exact(&mut file_name_bytes)?;
        // Lossy conversion keeps non-UTF8 names usable
        let name = String::from_utf8_lossy(&file_name_bytes).to_string();

        let mut extra = vec![0u8; extra_field_length as usize];
        rest.read_exact(&mut extra)?;

        // The local header ZIP64 field stores the uncompressed size first, then
        // the compressed size, each only when the 32-bit field is saturated.
        let mut zip64 = false;
        let mut cursor = Cursor::new(&extra[..]);
        let extra_end = extra.len() as u64;
        while cursor.position() + 4 <= extra_end {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let field_size = cursor.read_u16::<LittleEndian>()? as u64;
            let field_end = (cursor.position() + field_size).min(extra_end);

            if header_id == ZIP64_EXTRA_ID {
                zip64 = true;
                if uncompressed_size == 0xFFFF_FFFF && cursor.position() + 8 <= field_end {
                    uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFF_FFFF && cursor.position() + 8 <= field_end {
                    compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
            }
            cursor.set_position(field_end);
        }

        let kind = if name.ends_with('/') {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        Ok(Self {
            name,
            kind,
            compression_method: CompressionMethod::from_u16(compression_method),
            flags,
            crc32,
            compressed_size,
            uncompressed_size,
            zip64,
        })
    }
}
