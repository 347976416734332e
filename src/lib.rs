//! # docbridge
//!
//! Blocking file calls for an engine worker thread, served by an asynchronous,
//! callback-driven document picker.
//!
//! The engine wants plain functions: save these bytes, give me a file, unzip
//! an archive into this directory. The host only offers a picker that reports
//! the user's choice later, on its own UI thread. [`RequestBridge`] launches
//! the picker request and parks the caller on a per-call [`PendingRequest`];
//! the host reports back through [`CompletionSink`], which does the document
//! I/O and wakes the caller.
//!
//! ## Features
//!
//! - Fire-and-forget saves, blocking loads and blocking archive extraction
//! - Streaming ZIP extraction (STORED and DEFLATE, data descriptors, ZIP64 sizes)
//! - Local, `file://` and `http(s)://` documents
//! - Interruptible waits that tolerate late completions
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use docbridge::host::{ChannelPicker, FixedChooser, HostUi};
//! use docbridge::{BridgeConfig, LogNotifier, RequestBridge, SchemeStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (picker, requests) = ChannelPicker::channel();
//!     let bridge = RequestBridge::new(
//!         BridgeConfig::default(),
//!         Arc::new(picker),
//!         Arc::new(SchemeStore::local_only()),
//!         Arc::new(LogNotifier::new()),
//!     );
//!
//!     // The host UI answers every picker request with the same archive
//!     let host = HostUi::new(Arc::new(FixedChooser::approve("data.zip")), bridge.completion_sink());
//!     let host = tokio::spawn(host.run(requests));
//!
//!     let unzipped = tokio::task::spawn_blocking(move || {
//!         bridge.unzip_file("Choose game data", Path::new("data/"))
//!     })
//!     .await?;
//!     println!("unzipped: {unzipped}");
//!
//!     host.await??;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod io;
pub mod notify;
pub mod zip;

pub use bridge::{
    CompletionSink, DocumentPicker, PendingRequest, PickerOutcome, PickerRequest, RequestBridge, RequestKind,
    Status, Ticket,
};
pub use cli::Cli;
pub use config::BridgeConfig;
pub use error::{ArchiveError, BridgeError};
pub use io::{DocumentHandle, DocumentStore, HttpDocumentStore, LocalDocumentStore, SchemeStore};
pub use notify::{LogNotifier, Notifier};
pub use zip::{ArchiveExtractor, ExtractSummary};
