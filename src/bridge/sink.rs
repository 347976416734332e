use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::{InFlight, PendingRequest, PickerOutcome, Registry, Ticket};
use crate::io::DocumentHandle;
use crate::zip::{ArchiveExtractor, ExtractSummary};

/// Callback side of the bridge, driven by the host's UI thread.
///
/// Holds only the registry, not the picker, so keeping a sink alive does not
/// keep the host's request channel open.
#[derive(Clone)]
pub struct CompletionSink {
    registry: Arc<Registry>,
}

impl CompletionSink {
    pub(super) fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Finish the request identified by `ticket`.
    ///
    /// Saves write their payload; loads and extractions resolve their
    /// pending request and wake the caller, even if that caller already gave
    /// up. Unknown tickets are ignored.
    pub fn on_result(&self, ticket: Ticket, outcome: PickerOutcome) {
        let Some(state) = self.registry.lock_unpoisoned().remove(&ticket) else {
            tracing::warn!(%ticket, "completion for unknown request ignored");
            return;
        };
        tracing::debug!(%ticket, ?outcome, "picker completed");

        match state {
            InFlight::Save { payload } => self.complete_save(payload, outcome),
            InFlight::Load { request } => self.complete_load(outcome).resolve(&request),
            InFlight::Extract {
                request,
                destination,
            } => self.complete_extract(outcome, &destination).resolve(&request),
        }
    }

    fn notify(&self, what: &str, handle: &impl std::fmt::Display) {
        self.registry
            .notifier
            .notify(&format!("{} unable to {what} {handle}", self.registry.config.app_name));
    }

    /// Picker failures are reported like I/O failures; cancellation is not.
    fn approved(&self, outcome: PickerOutcome) -> Completion<DocumentHandle> {
        match outcome {
            PickerOutcome::Approved(handle) => Completion::Done(handle),
            PickerOutcome::Cancelled => Completion::Cancelled,
            PickerOutcome::Error(reason) => {
                self.notify("open the document picker:", &reason);
                Completion::Failed
            }
        }
    }

    // The payload is dropped on every path out of here.
    fn complete_save(&self, payload: Vec<u8>, outcome: PickerOutcome) {
        let Completion::Done(handle) = self.approved(outcome) else {
            return;
        };

        match self.write_document(&handle, &payload) {
            Ok(()) => tracing::info!(%handle, bytes = payload.len(), "saved document"),
            Err(e) => {
                tracing::warn!(%handle, error = %format!("{e:#}"), "save failed");
                self.notify("save file to", &handle);
            }
        }
    }

    fn write_document(&self, handle: &DocumentHandle, payload: &[u8]) -> Result<()> {
        let mut output = self.registry.store.open_write(handle)?;
        output.write_all(payload).context("writing document")?;
        output.flush().context("flushing document")?;
        Ok(())
    }

    fn complete_load(&self, outcome: PickerOutcome) -> Completion<Vec<u8>> {
        self.approved(outcome).and_then(|handle| match self.read_document(&handle) {
            Ok(bytes) => Completion::Done(bytes),
            Err(e) => {
                tracing::warn!(%handle, error = %format!("{e:#}"), "load failed");
                self.notify("open", &handle);
                Completion::Failed
            }
        })
    }

    fn read_document(&self, handle: &DocumentHandle) -> Result<Vec<u8>> {
        let mut input = self.registry.store.open_read(handle)?;
        let mut chunk = vec![0u8; self.registry.config.load_chunk_size.max(1)];
        let mut bytes = Vec::new();
        loop {
            let n = input.read(&mut chunk).context("reading document")?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
        }
        tracing::info!(%handle, bytes = bytes.len(), "loaded document");
        Ok(bytes)
    }

    fn complete_extract(&self, outcome: PickerOutcome, destination: &Path) -> Completion<ExtractSummary> {
        self.approved(outcome).and_then(|handle| match self.extract_document(&handle, destination) {
            Ok(summary) => Completion::Done(summary),
            Err(e) => {
                tracing::warn!(%handle, error = %format!("{e:#}"), "extraction failed");
                self.notify("open", &handle);
                Completion::Failed
            }
        })
    }

    fn extract_document(&self, handle: &DocumentHandle, destination: &Path) -> Result<ExtractSummary> {
        let input = self.registry.store.open_read(handle)?;
        let buffer_size = self.registry.config.extract_buffer_size;
        let summary = ArchiveExtractor::new(buffer_size)
            .extract(BufReader::with_capacity(buffer_size.max(1), input), destination)
            .with_context(|| format!("extracting into {}", destination.display()))?;

        tracing::info!(
            %handle,
            destination = %destination.display(),
            files = summary.files,
            directories = summary.directories,
            bytes = summary.bytes_written,
            "extracted archive"
        );
        Ok(summary)
    }
}

/// How a completion ends for the waiting caller.
enum Completion<T> {
    Done(T),
    Cancelled,
    Failed,
}

impl<T> Completion<T> {
    fn and_then<U>(self, f: impl FnOnce(T) -> Completion<U>) -> Completion<U> {
        match self {
            Completion::Done(value) => f(value),
            Completion::Cancelled => Completion::Cancelled,
            Completion::Failed => Completion::Failed,
        }
    }

    fn resolve(self, request: &PendingRequest<T>) {
        match self {
            Completion::Done(value) => request.succeed(value),
            Completion::Cancelled => request.cancel(),
            Completion::Failed => request.fail(),
        };
    }
}
