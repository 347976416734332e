use super::{DocumentHandle, DocumentStore};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Documents on the local filesystem, addressed by path or `file://` URI
#[derive(Debug, Default, Clone)]
pub struct LocalDocumentStore;

impl LocalDocumentStore {
    pub fn new() -> Self {
        Self
    }

    fn path(handle: &DocumentHandle) -> PathBuf {
        let raw = handle.as_str();
        Path::new(raw.strip_prefix("file://").unwrap_or(raw)).to_path_buf()
    }
}

impl DocumentStore for LocalDocumentStore {
    fn open_read(&self, handle: &DocumentHandle) -> Result<Box<dyn Read + Send>> {
        let path = Self::path(handle);
        let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Box::new(file))
    }

    fn open_write(&self, handle: &DocumentHandle) -> Result<Box<dyn Write + Send>> {
        let path = Self::path(handle);
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}
