//! A terminal stand-in for the host UI.
//!
//! [`ChannelPicker`] is the [`DocumentPicker`] the bridge talks to; it only
//! forwards requests. [`HostUi::run`] is the UI thread: it takes one request
//! at a time, asks a [`Chooser`] for the user's answer and reports it to the
//! [`CompletionSink`].

mod chooser;

pub use chooser::{Chooser, FixedChooser, PromptChooser};

use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::bridge::{CompletionSink, DocumentPicker, PickerRequest};

/// Picker that hands requests to a [`HostUi`] over a channel.
pub struct ChannelPicker {
    requests: UnboundedSender<PickerRequest>,
}

impl ChannelPicker {
    /// Picker plus the receiving end for [`HostUi::run`].
    pub fn channel() -> (Self, UnboundedReceiver<PickerRequest>) {
        let (requests, receiver) = unbounded_channel();
        (Self { requests }, receiver)
    }
}

impl DocumentPicker for ChannelPicker {
    fn launch(&self, request: PickerRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| anyhow!("host UI is no longer running"))
    }
}

/// Event loop standing in for the host's UI thread.
pub struct HostUi {
    chooser: Arc<dyn Chooser>,
    sink: CompletionSink,
}

impl HostUi {
    pub fn new(chooser: Arc<dyn Chooser>, sink: CompletionSink) -> Self {
        Self { chooser, sink }
    }

    /// Serve requests until every [`ChannelPicker`] sender is gone.
    ///
    /// Completions run one at a time on a blocking thread, since they do
    /// file I/O and may extract a whole archive.
    pub async fn run(self, mut requests: UnboundedReceiver<PickerRequest>) -> Result<usize> {
        let mut served = 0;
        while let Some(request) = requests.recv().await {
            let ticket = request.ticket();
            let outcome = self.chooser.choose(&request).await;
            tracing::debug!(%ticket, ?outcome, "user answered picker");

            let sink = self.sink.clone();
            tokio::task::spawn_blocking(move || sink.on_result(ticket, outcome)).await?;
            served += 1;
        }
        Ok(served)
    }
}
