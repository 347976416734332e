//! Error types surfaced by the bridge and the archive extractor.

use std::io;

use thiserror::Error;

/// Why a blocking bridge call produced no result.
///
/// The completion thread never hands an error object to the caller; it only
/// sets a terminal status. `IoFailure` therefore carries no source, the
/// details go to the [`Notifier`](crate::Notifier) instead.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The user dismissed the picker. Not a fault.
    #[error("document picker was cancelled")]
    UserCancelled,

    /// A stream read or write failed while completing the request.
    #[error("document I/O failed")]
    IoFailure,

    /// The caller stopped waiting before a result arrived.
    #[error("wait for the document picker was interrupted")]
    InterruptedWait,

    /// The host refused to launch the picker request.
    #[error("document picker unavailable: {0}")]
    PickerUnavailable(String),
}

impl BridgeError {
    /// True for the outcome the user chose, as opposed to a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BridgeError::UserCancelled)
    }
}

/// Errors raised while expanding an archive stream.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid local file header signature {0:02x?}")]
    InvalidHeader([u8; 4]),

    #[error("entry {0} is encrypted")]
    Encrypted(String),

    #[error("entry {name} uses unsupported compression method {method}")]
    UnsupportedCompression { name: String, method: u16 },

    #[error("stored entry {0} has no size in its header")]
    StoredWithDescriptor(String),

    #[error("checksum mismatch in {name}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("size mismatch in {name}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("corrupt deflate stream: {0}")]
    CorruptStream(String),
}

