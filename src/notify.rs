//! User-facing failure notices.
//!
//! The host shows these as transient messages. Only I/O failures are
//! reported; a cancelled picker is the user's choice and stays silent.

/// Receives failure messages naming the document that could not be used.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that turns messages into `warn` events.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::warn!(target: "docbridge::notice", "{message}");
    }
}
