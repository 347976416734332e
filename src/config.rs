//! Bridge configuration.

use crate::zip::DEFAULT_BUFFER_SIZE;

/// Transfer chunk used when reading a loaded document
pub const DEFAULT_LOAD_CHUNK_SIZE: usize = 4096;

/// Tunables shared by the bridge and its completion sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Prefix of every message handed to the notifier
    pub app_name: String,
    /// MIME type announced on create-document requests
    pub save_mime_type: String,
    /// MIME type the picker filters on for archive extraction
    pub archive_mime_type: String,
    pub load_chunk_size: usize,
    pub extract_buffer_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            app_name: env!("CARGO_PKG_NAME").to_string(),
            save_mime_type: "text/plain".to_string(),
            archive_mime_type: "application/zip".to_string(),
            load_chunk_size: DEFAULT_LOAD_CHUNK_SIZE,
            extract_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl BridgeConfig {
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn with_save_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.save_mime_type = mime.into();
        self
    }

    pub fn with_archive_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.archive_mime_type = mime.into();
        self
    }

    /// Zero is clamped to a one-byte chunk.
    pub fn with_load_chunk_size(mut self, size: usize) -> Self {
        self.load_chunk_size = size.max(1);
        self
    }

    /// Zero is clamped to a one-byte buffer.
    pub fn with_extract_buffer_size(mut self, size: usize) -> Self {
        self.extract_buffer_size = size.max(1);
        self
    }
}
