mod http;
mod local;

pub use http::HttpDocumentStore;
pub use local::LocalDocumentStore;

use anyhow::Result;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

/// Opaque reference to a document the user picked.
///
/// Local paths, `file://` URIs and `http(s)://` URLs are understood by the
/// stores in this module; a host may hand out anything its own store
/// resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentHandle(String);

impl DocumentHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_http(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentHandle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Opens byte streams for picked documents, the way a host content resolver
/// does.
pub trait DocumentStore: Send + Sync {
    fn open_read(&self, handle: &DocumentHandle) -> Result<Box<dyn Read + Send>>;

    fn open_write(&self, handle: &DocumentHandle) -> Result<Box<dyn Write + Send>>;
}

/// Routes `http(s)://` handles to an HTTP store and everything else to the
/// local filesystem.
pub struct SchemeStore {
    local: LocalDocumentStore,
    http: Option<Arc<HttpDocumentStore>>,
}

impl SchemeStore {
    /// Store that only understands local handles.
    pub fn local_only() -> Self {
        Self {
            local: LocalDocumentStore::new(),
            http: None,
        }
    }

    pub fn with_http(http: HttpDocumentStore) -> Self {
        Self {
            local: LocalDocumentStore::new(),
            http: Some(Arc::new(http)),
        }
    }

    fn http(&self, handle: &DocumentHandle) -> Result<&HttpDocumentStore> {
        self.http
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no HTTP support configured for {handle}"))
    }
}

impl DocumentStore for SchemeStore {
    fn open_read(&self, handle: &DocumentHandle) -> Result<Box<dyn Read + Send>> {
        if handle.is_http() {
            self.http(handle)?.open_read(handle)
        } else {
            self.local.open_read(handle)
        }
    }

    fn open_write(&self, handle: &DocumentHandle) -> Result<Box<dyn Write + Send>> {
        if handle.is_http() {
            self.http(handle)?.open_write(handle)
        } else {
            self.local.open_write(handle)
        }
    }
}
