//! Forward-only ZIP reader.
//!
//! The picker hands over a plain byte stream, so the central directory at the
//! end of the archive is out of reach. Entries are read from their local file
//! headers in stream order instead:
//!
//! 1. Read a local file header and announce the entry
//! 2. Hand out the entry's data through [`ZipStreamReader::read_data`]
//! 3. Read the data descriptor, if the header deferred CRC and sizes to it
//! 4. Verify CRC-32 and size, then move on to the next header
//!
//! The first central directory header ends the walk.

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::{Crc, Decompress, FlushDecompress, Status};
use std::io::{self, BufRead, Read};

use crate::error::ArchiveError;

use super::structures::*;

/// Decoder state of the entry currently being read.
enum Body {
    /// Uncompressed data with `remaining` bytes left.
    Stored { remaining: u64 },
    /// Raw deflate data; `remaining` bounds the input when the header knows
    /// the compressed size.
    Deflate {
        inflater: Box<Decompress>,
        remaining: Option<u64>,
        ended: bool,
    },
}

struct CurrentEntry {
    entry: ArchiveEntry,
    body: Body,
    crc: Crc,
    written: u64,
    finished: bool,
}

/// Streaming parser over any buffered byte source.
///
/// ## Example
///
/// ```ignore
/// let mut zip = ZipStreamReader::new(BufReader::new(file));
/// while let Some(entry) = zip.next_entry()? {
///     let mut buf = [0u8; 8192];
///     while zip.read_data(&mut buf)? > 0 {}
/// }
/// ```
pub struct ZipStreamReader<R: BufRead> {
    inner: R,
    current: Option<CurrentEntry>,
    done: bool,
}

impl<R: BufRead> ZipStreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            current: None,
            done: false,
        }
    }

    /// Advance to the next entry, draining whatever is left of the current
    /// one first.
    ///
    /// Returns `None` once the central directory (or a clean end of stream)
    /// is reached.
    pub fn next_entry(&mut self) -> Result<Option<ArchiveEntry>, ArchiveError> {
        if self.current.is_some() {
            let mut scratch = [0u8; 4096];
            while self.read_data(&mut scratch)? > 0 {}
        }
        self.current = None;

        if self.done {
            return Ok(None);
        }

        let mut fixed = [0u8; LFH_SIZE];
        let read = read_up_to(&mut self.inner, &mut fixed[..4])?;
        if read == 0 {
            self.done = true;
            return Ok(None);
        }
        if read < 4 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }

        let signature: [u8; 4] = [fixed[0], fixed[1], fixed[2], fixed[3]];
        if signature == CDFH_SIGNATURE
            || signature == EOCD_SIGNATURE
            || signature == ZIP64_EOCD_SIGNATURE
        {
            self.done = true;
            return Ok(None);
        }
        if signature != LFH_SIGNATURE {
            return Err(ArchiveError::InvalidHeader(signature));
        }

        self.inner.read_exact(&mut fixed[4..])?;
        let entry = ArchiveEntry::from_local_header(&fixed, &mut self.inner)?;

        if entry.is_encrypted() {
            return Err(ArchiveError::Encrypted(entry.name));
        }

        let body = match entry.compression_method {
            CompressionMethod::Stored if entry.has_data_descriptor() => {
                return Err(ArchiveError::StoredWithDescriptor(entry.name));
            }
            CompressionMethod::Stored => Body::Stored {
                remaining: entry.compressed_size,
            },
            CompressionMethod::Deflate => Body::Deflate {
                inflater: Box::new(Decompress::new(false)),
                remaining: (!entry.has_data_descriptor()).then_some(entry.compressed_size),
                ended: false,
            },
            CompressionMethod::Unknown(method) => {
                return Err(ArchiveError::UnsupportedCompression {
                    name: entry.name,
                    method,
                });
            }
        };

        tracing::trace!(name = %entry.name, method = entry.compression_method.as_u16(), "zip entry");

        self.current = Some(CurrentEntry {
            entry: entry.clone(),
            body,
            crc: Crc::new(),
            written: 0,
            finished: false,
        });
        Ok(Some(entry))
    }

    /// Read decompressed bytes of the current entry.
    ///
    /// Returns `Ok(0)` at the end of the entry, after its checksum and size
    /// were verified, or when there is no current entry.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, ArchiveError> {
        let Some(current) = self.current.as_mut() else {
            return Ok(0);
        };
        if current.finished || buf.is_empty() {
            return Ok(0);
        }

        let produced = match &mut current.body {
            Body::Stored { remaining } => {
                if *remaining == 0 {
                    0
                } else {
                    let want = (*remaining).min(buf.len() as u64) as usize;
                    let n = self.inner.read(&mut buf[..want])?;
                    if n == 0 {
                        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
                    }
                    *remaining -= n as u64;
                    n
                }
            }
            Body::Deflate { ended: true, .. } => 0,
            Body::Deflate {
                inflater,
                remaining,
                ended,
            } => {
                let (n, stream_end) = inflate(&mut self.inner, inflater, remaining, buf)?;
                *ended = stream_end;
                n
            }
        };

        if produced > 0 {
            current.crc.update(&buf[..produced]);
            current.written += produced as u64;
            return Ok(produced);
        }

        current.finished = true;
        let entry = &current.entry;
        let (expected_crc, expected_size) = if entry.has_data_descriptor() {
            read_data_descriptor(&mut self.inner, entry.zip64)?
        } else {
            (entry.crc32, entry.uncompressed_size)
        };

        if current.written != expected_size {
            return Err(ArchiveError::SizeMismatch {
                name: entry.name.clone(),
                expected: expected_size,
                actual: current.written,
            });
        }
        if current.crc.sum() != expected_crc {
            return Err(ArchiveError::ChecksumMismatch {
                name: entry.name.clone(),
                expected: expected_crc,
                actual: current.crc.sum(),
            });
        }
        Ok(0)
    }
}

/// Inflate into `buf`, consuming exactly the compressed bytes the decoder
/// used so the next header starts where the deflate stream ended.
///
/// Returns the bytes produced and whether the deflate stream is complete.
fn inflate<R: BufRead>(
    inner: &mut R,
    inflater: &mut Decompress,
    remaining: &mut Option<u64>,
    buf: &mut [u8],
) -> Result<(usize, bool), ArchiveError> {
    loop {
        let input = inner.fill_buf()?;
        let limit = match remaining {
            Some(left) => (*left).min(input.len() as u64) as usize,
            None => input.len(),
        };
        let input = &input[..limit];
        let eof = input.is_empty();

        let before_in = inflater.total_in();
        let before_out = inflater.total_out();
        let flush = if eof {
            FlushDecompress::Finish
        } else {
            FlushDecompress::None
        };
        let status = inflater
            .decompress(input, buf, flush)
            .map_err(|e| ArchiveError::CorruptStream(e.to_string()))?;

        let consumed = (inflater.total_in() - before_in) as usize;
        let produced = (inflater.total_out() - before_out) as usize;
        inner.consume(consumed);
        if let Some(left) = remaining {
            *left -= consumed as u64;
        }

        match status {
            Status::StreamEnd => {
                // Padding between the deflate stream and the declared size
                if let Some(left) = remaining.take() {
                    if left > 0 {
                        io::copy(&mut inner.by_ref().take(left), &mut io::sink())?;
                    }
                }
                return Ok((produced, true));
            }
            _ if produced > 0 => return Ok((produced, false)),
            _ if eof => {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            _ if consumed == 0 => {
                return Err(ArchiveError::CorruptStream("inflater made no progress".to_string()));
            }
            _ => continue,
        }
    }
}

/// Read `(crc32, uncompressed_size)` from a data descriptor. The leading
/// signature is optional in the format.
fn read_data_descriptor<R: Read>(inner: &mut R, zip64: bool) -> Result<(u32, u64), ArchiveError> {
    let first = inner.read_u32::<LittleEndian>()?;
    let crc32 = if first == DATA_DESCRIPTOR_SIGNATURE {
        inner.read_u32::<LittleEndian>()?
    } else {
        first
    };

    let uncompressed_size = if zip64 {
        let _compressed = inner.read_u64::<LittleEndian>()?;
        inner.read_u64::<LittleEndian>()?
    } else {
        let _compressed = inner.read_u32::<LittleEndian>()?;
        inner.read_u32::<LittleEndian>()? as u64
    };

    Ok((crc32, uncompressed_size))
}

/// Like `read_exact`, but a clean end of stream before the first byte
/// reports 0 instead of failing.
fn read_up_to<R: Read>(inner: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match inner.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
