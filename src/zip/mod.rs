//! Streaming ZIP extraction.
//!
//! The archive arrives as a forward-only byte stream from the document
//! picker, so nothing here seeks. Entries are taken from their local file
//! headers in the order the archive stores them.
//!
//! ## Architecture
//!
//! - [`structures`]: Local header layout and the parsed [`ArchiveEntry`]
//! - [`reader`]: [`ZipStreamReader`], which walks headers and inflates entry data
//! - [`extractor`]: [`ArchiveExtractor`], which writes entries below a directory
//!
//! ## Supported Features
//!
//! - STORED and DEFLATE entries
//! - Data descriptors after DEFLATE entries (bit 3 of the general purpose flag)
//! - ZIP64 sizes in local headers and data descriptors
//! - CRC-32 and size verification per entry
//!
//! ## Limitations
//!
//! - No encryption support
//! - STORED entries must carry their size in the local header
//! - Entry names are trusted; see [`ArchiveExtractor`]

mod extractor;
mod reader;
mod structures;

pub use extractor::{ArchiveExtractor, DEFAULT_BUFFER_SIZE, ExtractSummary};
pub use reader::ZipStreamReader;
pub use structures::{ArchiveEntry, CompressionMethod, EntryKind};
