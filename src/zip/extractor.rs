use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::ArchiveError;

use super::reader::ZipStreamReader;
use super::structures::ArchiveEntry;

/// Copy buffer used when no size is configured
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Totals of one extraction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub directories: usize,
    pub files: usize,
    pub bytes_written: u64,
}

/// Expands a ZIP byte stream onto a directory, entry by entry, in archive
/// order.
///
/// Entry names are appended to the destination as they are. Names with `..`
/// segments or absolute paths are not rejected, so the destination must be a
/// directory dedicated to this archive. A failing entry aborts the run and
/// leaves everything written so far in place.
pub struct ArchiveExtractor {
    buffer_size: usize,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl ArchiveExtractor {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    /// Extract every entry of `stream` below `destination`.
    pub fn extract<R: BufRead>(&self, stream: R, destination: &Path) -> Result<ExtractSummary, ArchiveError> {
        let mut zip = ZipStreamReader::new(stream);
        let mut buffer = vec![0u8; self.buffer_size];
        let mut summary = ExtractSummary::default();

        while let Some(entry) = zip.next_entry()? {
            let target = target_path(destination, &entry.name);

            if entry.is_directory() {
                fs::create_dir_all(&target)?;
                summary.directories += 1;
                continue;
            }

            let written = self.extract_file(&mut zip, &entry, &target, &mut buffer)?;
            summary.files += 1;
            summary.bytes_written += written;
        }

        Ok(summary)
    }

    fn extract_file<R: BufRead>(
        &self,
        zip: &mut ZipStreamReader<R>,
        entry: &ArchiveEntry,
        target: &Path,
        buffer: &mut [u8],
    ) -> Result<u64, ArchiveError> {
        // Archives are not required to carry directory markers
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = File::create(target)?;
        let mut written = 0u64;
        loop {
            let n = zip.read_data(buffer)?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])?;
            written += n as u64;
        }
        file.flush()?;

        tracing::debug!(name = %entry.name, bytes = written, "extracted");
        Ok(written)
    }
}

/// `destination` followed by the entry name, with exactly the separator the
/// destination lacks. No normalization happens here.
fn target_path(destination: &Path, name: &str) -> PathBuf {
    let mut joined = OsString::from(destination.as_os_str());
    let has_separator = destination
        .as_os_str()
        .to_string_lossy()
        .ends_with(['/', std::path::MAIN_SEPARATOR]);
    if !has_separator && !destination.as_os_str().is_empty() {
        joined.push("/");
    }
    joined.push(name);
    PathBuf::from(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_path_concatenates() {
        assert_eq!(target_path(Path::new("/tmp/out/"), "a/x.txt"), PathBuf::from("/tmp/out/a/x.txt"));
        assert_eq!(target_path(Path::new("/tmp/out"), "a/"), PathBuf::from("/tmp/out/a/"));
    }

    #[test]
    fn destination_without_separator_gets_exactly_one() {
        // Joined as text, not as path components: the separator is added,
        // never doubled.
        let joined = target_path(Path::new("out"), "a/x");
        assert_eq!(joined.as_os_str(), "out/a/x");
        let joined = target_path(Path::new("out/"), "a/x");
        assert_eq!(joined.as_os_str(), "out/a/x");
    }

    #[test]
    fn target_path_keeps_parent_segments() {
        // No traversal defense: the name is appended verbatim
        assert_eq!(target_path(Path::new("out"), "../escape"), PathBuf::from("out/../escape"));
    }

    #[test]
    fn empty_stream_extracts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let summary = ArchiveExtractor::default().extract(&b""[..], dir.path()).unwrap();
        assert_eq!(summary, ExtractSummary::default());
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveExtractor::default()
            .extract(&b"not a zip at all"[..], dir.path())
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidHeader(_)));
    }
}
