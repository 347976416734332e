//! Blocking file calls on top of an asynchronous document picker.
//!
//! The engine calls [`RequestBridge`] from a worker thread. Each call launches
//! a picker request through the host's [`DocumentPicker`] and, for loads and
//! archive extraction, parks on a [`PendingRequest`] until the host reports
//! the user's choice to the [`CompletionSink`] on its own thread.
//!
//! ```text
//! worker thread                         host UI thread
//! -------------                         --------------
//! request_load ──launch(ticket)──────▶  picker dialog
//!     │ wait                                  │
//!     │                                 CompletionSink::on_result
//!     │                                   read document, resolve
//!     ◀──────────── notify ───────────────────┘
//! return bytes
//! ```

mod pending;
mod sink;

pub use pending::{PendingRequest, Status};
pub use sink::CompletionSink;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::io::{DocumentHandle, DocumentStore};
use crate::notify::Notifier;
use crate::zip::ExtractSummary;

/// The three operations the engine can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Save,
    Load,
    Extract,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestKind::Save => "save",
            RequestKind::Load => "load",
            RequestKind::Extract => "extract",
        })
    }
}

/// Identity of one call. Sent along with the picker request and returned
/// with its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub kind: RequestKind,
    pub id: u64,
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// What the host is asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerRequest {
    /// Let the user choose where a new document goes.
    CreateDocument {
        ticket: Ticket,
        suggested_name: String,
        mime_type: String,
    },
    /// Let the user choose an existing document.
    OpenDocument {
        ticket: Ticket,
        prompt: String,
        mime_type: String,
    },
}

impl PickerRequest {
    pub fn ticket(&self) -> Ticket {
        match self {
            PickerRequest::CreateDocument { ticket, .. } | PickerRequest::OpenDocument { ticket, .. } => *ticket,
        }
    }
}

/// Terminal outcome of a picker request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    Approved(DocumentHandle),
    Cancelled,
    /// The host could not run the picker at all.
    Error(String),
}

/// The host's asynchronous document picker.
///
/// `launch` must return without waiting for the user. The host answers every
/// launched request exactly once through [`CompletionSink::on_result`].
pub trait DocumentPicker: Send + Sync {
    fn launch(&self, request: PickerRequest) -> Result<()>;
}

/// Per-call state the completion needs, tagged by request kind.
enum InFlight {
    Save { payload: Vec<u8> },
    Load { request: Arc<PendingRequest<Vec<u8>>> },
    Extract {
        request: Arc<PendingRequest<ExtractSummary>>,
        destination: PathBuf,
    },
}

/// A caller parked in `wait`. Registered from before launch until the wait
/// returns, independent of whether the completion has started.
enum Waiter {
    Load(Arc<PendingRequest<Vec<u8>>>),
    Extract(Arc<PendingRequest<ExtractSummary>>),
}

impl Waiter {
    fn interrupt(&self) {
        match self {
            Waiter::Load(request) => request.interrupt(),
            Waiter::Extract(request) => request.interrupt(),
        }
    }
}

/// State shared with the completion sink. Deliberately holds no picker, so
/// the host can notice when the last bridge is gone.
struct Registry {
    config: BridgeConfig,
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    in_flight: Mutex<HashMap<Ticket, InFlight>>,
    waiters: Mutex<HashMap<Ticket, Waiter>>,
}

impl Registry {
    fn lock_unpoisoned(&self) -> MutexGuard<'_, HashMap<Ticket, InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn waiters(&self) -> MutexGuard<'_, HashMap<Ticket, Waiter>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Synchronous save, load and unzip calls for the engine.
///
/// Cheap to clone; clones share the in-flight table.
#[derive(Clone)]
pub struct RequestBridge {
    picker: Arc<dyn DocumentPicker>,
    registry: Arc<Registry>,
    next_id: Arc<AtomicU64>,
}

impl RequestBridge {
    pub fn new(
        config: BridgeConfig,
        picker: Arc<dyn DocumentPicker>,
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            picker,
            registry: Arc::new(Registry {
                config,
                store,
                notifier,
                in_flight: Mutex::new(HashMap::new()),
                waiters: Mutex::new(HashMap::new()),
            }),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The entry point the host invokes when a picker request ends.
    pub fn completion_sink(&self) -> CompletionSink {
        CompletionSink::new(Arc::clone(&self.registry))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.registry.config
    }

    /// Number of launched requests still waiting for their completion.
    pub fn in_flight(&self) -> usize {
        self.registry.lock_unpoisoned().len()
    }

    /// Number of callers currently blocked on a load or extraction.
    pub fn waiting(&self) -> usize {
        self.registry.waiters().len()
    }

    fn ticket(&self, kind: RequestKind) -> Ticket {
        Ticket {
            kind,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Register `state` (and the caller, if it is going to block) under
    /// `ticket` and launch `request`. On a refused launch both registrations
    /// are rolled back.
    fn launch(
        &self,
        ticket: Ticket,
        state: InFlight,
        waiter: Option<Waiter>,
        request: PickerRequest,
    ) -> Result<(), BridgeError> {
        if let Some(waiter) = waiter {
            self.registry.waiters().insert(ticket, waiter);
        }
        self.registry.lock_unpoisoned().insert(ticket, state);
        tracing::debug!(%ticket, "launching picker request");

        if let Err(e) = self.picker.launch(request) {
            self.registry.lock_unpoisoned().remove(&ticket);
            self.registry.waiters().remove(&ticket);
            tracing::warn!(%ticket, error = %e, "picker refused request");
            return Err(BridgeError::PickerUnavailable(e.to_string()));
        }
        Ok(())
    }

    /// Block on `pending`, then stop being reachable by `interrupt`.
    fn wait<T>(&self, ticket: Ticket, pending: &PendingRequest<T>) -> Result<T, BridgeError> {
        let result = pending.wait();
        self.registry.waiters().remove(&ticket);
        tracing::debug!(%ticket, ok = result.is_ok(), "wait finished");
        result
    }

    /// Ask the user where to save `bytes` and write them there.
    ///
    /// Returns as soon as the request is launched. The write happens on the
    /// completion thread; a failure there goes to the notifier and never back
    /// to this call site.
    pub fn request_save(&self, filename: &str, bytes: Vec<u8>) -> Result<(), BridgeError> {
        let ticket = self.ticket(RequestKind::Save);
        let request = PickerRequest::CreateDocument {
            ticket,
            suggested_name: filename.to_string(),
            mime_type: self.registry.config.save_mime_type.clone(),
        };
        self.launch(ticket, InFlight::Save { payload: bytes }, None, request)
    }

    /// Ask the user for a document matching `mime_type` and return its
    /// contents. Blocks until the picker completes or the wait is interrupted.
    pub fn request_load(&self, prompt: &str, mime_type: &str) -> Result<Vec<u8>, BridgeError> {
        let ticket = self.ticket(RequestKind::Load);
        let pending = Arc::new(PendingRequest::new());
        let request = PickerRequest::OpenDocument {
            ticket,
            prompt: prompt.to_string(),
            mime_type: mime_type.to_string(),
        };
        self.launch(
            ticket,
            InFlight::Load {
                request: Arc::clone(&pending),
            },
            Some(Waiter::Load(Arc::clone(&pending))),
            request,
        )?;

        self.wait(ticket, &pending)
    }

    /// Ask the user for an archive and extract it below `destination`.
    ///
    /// Extraction runs on the completion thread; this call blocks until it is
    /// done, the picker is cancelled, or the wait is interrupted.
    pub fn request_extract_archive(&self, prompt: &str, destination: &Path) -> Result<ExtractSummary, BridgeError> {
        let ticket = self.ticket(RequestKind::Extract);
        let pending = Arc::new(PendingRequest::new());
        let request = PickerRequest::OpenDocument {
            ticket,
            prompt: prompt.to_string(),
            mime_type: self.registry.config.archive_mime_type.clone(),
        };
        self.launch(
            ticket,
            InFlight::Extract {
                request: Arc::clone(&pending),
                destination: destination.to_path_buf(),
            },
            Some(Waiter::Extract(Arc::clone(&pending))),
            request,
        )?;

        self.wait(ticket, &pending)
    }

    /// Wake every caller blocked on a request of `kind` with
    /// [`BridgeError::InterruptedWait`].
    ///
    /// This also reaches callers whose completion is already reading the
    /// document or extracting the archive. The picker requests stay live;
    /// their completions still run and resolve the abandoned requests. Saves
    /// never block, so interrupting them does nothing.
    pub fn interrupt(&self, kind: RequestKind) {
        let waiters = self.registry.waiters();
        for (ticket, waiter) in waiters.iter().filter(|(ticket, _)| ticket.kind == kind) {
            tracing::debug!(%ticket, "interrupting wait");
            waiter.interrupt();
        }
    }
}

/// Convenience wrappers with the engine's plain return conventions.
impl RequestBridge {
    /// Fire-and-forget save.
    pub fn save_file(&self, filename: &str, bytes: Vec<u8>) {
        if let Err(e) = self.request_save(filename, bytes) {
            self.registry
                .notifier
                .notify(&format!("{} unable to save file: {e}", self.registry.config.app_name));
        }
    }

    /// Contents of the picked document, or `None` on any failure.
    pub fn get_file(&self, prompt: &str, mime_type: &str) -> Option<Vec<u8>> {
        self.request_load(prompt, mime_type).ok()
    }

    /// Whether an archive was picked and fully extracted.
    pub fn unzip_file(&self, prompt: &str, destination: &Path) -> bool {
        self.request_extract_archive(prompt, destination).is_ok()
    }
}
