use async_trait::async_trait;
use std::io;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::bridge::{PickerOutcome, PickerRequest};
use crate::io::DocumentHandle;

/// Plays the user in front of the picker dialog.
#[async_trait]
pub trait Chooser: Send + Sync {
    async fn choose(&self, request: &PickerRequest) -> PickerOutcome;
}

/// Answers every request the same way.
#[derive(Debug, Clone)]
pub struct FixedChooser {
    answer: Option<DocumentHandle>,
}

impl FixedChooser {
    pub fn approve(handle: impl Into<String>) -> Self {
        Self {
            answer: Some(DocumentHandle::new(handle)),
        }
    }

    pub fn cancel() -> Self {
        Self { answer: None }
    }
}

#[async_trait]
impl Chooser for FixedChooser {
    async fn choose(&self, _request: &PickerRequest) -> PickerOutcome {
        match &self.answer {
            Some(handle) => PickerOutcome::Approved(handle.clone()),
            None => PickerOutcome::Cancelled,
        }
    }
}

/// Asks on the terminal: the prompt goes to stderr, the handle is read from
/// stdin. An empty line or end of input cancels.
pub struct PromptChooser {
    stdin: Mutex<BufReader<tokio::io::Stdin>>,
}

impl Default for PromptChooser {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptChooser {
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }

    fn question(request: &PickerRequest) -> String {
        match request {
            PickerRequest::CreateDocument {
                suggested_name,
                mime_type,
                ..
            } => format!("Save {suggested_name} ({mime_type}) to: "),
            PickerRequest::OpenDocument {
                prompt, mime_type, ..
            } => format!("{prompt} [{mime_type}]: "),
        }
    }
}

/// Write the question and flush it out; either failing means the user never
/// saw it.
async fn ask<W: AsyncWrite + Unpin>(out: &mut W, question: &str) -> io::Result<()> {
    out.write_all(question.as_bytes()).await?;
    out.flush().await
}

#[async_trait]
impl Chooser for PromptChooser {
    async fn choose(&self, request: &PickerRequest) -> PickerOutcome {
        if let Err(e) = ask(&mut tokio::io::stderr(), &Self::question(request)).await {
            return PickerOutcome::Error(e.to_string());
        }

        let mut line = String::new();
        let mut stdin = self.stdin.lock().await;
        match stdin.read_line(&mut line).await {
            Ok(_) => match line.trim() {
                "" => PickerOutcome::Cancelled,
                handle => PickerOutcome::Approved(DocumentHandle::new(handle)),
            },
            Err(e) => PickerOutcome::Error(e.to_string()),
        }
    }
}
