//! One-shot rendezvous between a blocked caller and the completion thread.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::BridgeError;

/// Where a request stands. Leaves `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Success,
    Cancelled,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        self != Status::Pending
    }
}

struct Slot<T> {
    status: Status,
    payload: Option<T>,
    interrupted: bool,
}

/// Completion flag plus payload for a single call, guarded by a mutex and a
/// condition variable.
///
/// A fresh instance is created for every call and dropped once the caller has
/// read it, so a late signal can never reach a later call.
pub struct PendingRequest<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Default for PendingRequest<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PendingRequest<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                status: Status::Pending,
                payload: None,
                interrupted: false,
            }),
            ready: Condvar::new(),
        }
    }

    // A panic on the other side must not wedge this one.
    fn lock_unpoisoned(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> Status {
        self.lock_unpoisoned().status
    }

    /// Set the terminal status and wake the waiter.
    ///
    /// The status is written and the waiter notified under the same lock the
    /// waiter re-checks, so a wakeup cannot be lost. Returns `false`, leaving
    /// the request untouched, if it was already resolved.
    pub fn resolve(&self, status: Status, payload: Option<T>) -> bool {
        debug_assert!(status.is_terminal(), "resolve with a pending status");
        let mut slot = self.lock_unpoisoned();
        if slot.status.is_terminal() {
            return false;
        }
        slot.status = status;
        slot.payload = if status == Status::Success { payload } else { None };
        self.ready.notify_one();
        true
    }

    pub fn succeed(&self, payload: T) -> bool {
        self.resolve(Status::Success, Some(payload))
    }

    pub fn cancel(&self) -> bool {
        self.resolve(Status::Cancelled, None)
    }

    pub fn fail(&self) -> bool {
        self.resolve(Status::Failed, None)
    }

    /// Stop a caller blocked in [`wait`](Self::wait) unless a result is
    /// already there. A later `resolve` still succeeds; nobody reads it.
    pub fn interrupt(&self) {
        let mut slot = self.lock_unpoisoned();
        slot.interrupted = true;
        self.ready.notify_one();
    }

    /// Block until the request leaves `Pending` or is interrupted, then take
    /// the result.
    ///
    /// A terminal status wins over an interrupt that raced with it.
    pub fn wait(&self) -> Result<T, BridgeError> {
        let mut slot = self.lock_unpoisoned();
        loop {
            match slot.status {
                Status::Success => return slot.payload.take().ok_or(BridgeError::IoFailure),
                Status::Cancelled => return Err(BridgeError::UserCancelled),
                Status::Failed => return Err(BridgeError::IoFailure),
                Status::Pending if slot.interrupted => return Err(BridgeError::InterruptedWait),
                Status::Pending => {
                    slot = self
                        .ready
                        .wait(slot)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn resolve_before_wait_is_not_lost() {
        let request = PendingRequest::new();
        assert!(request.succeed(vec![1u8, 2, 3]));
        assert_eq!(request.wait().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn resolve_after_wait_wakes_the_caller() {
        let request = Arc::new(PendingRequest::<Vec<u8>>::new());
        let waiter = {
            let request = Arc::clone(&request);
            thread::spawn(move || request.wait())
        };

        thread::sleep(Duration::from_millis(20));
        assert_eq!(request.status(), Status::Pending);
        request.succeed(b"late".to_vec());

        assert_eq!(waiter.join().unwrap().unwrap(), b"late".to_vec());
    }

    #[test]
    fn status_transitions_exactly_once() {
        let request = PendingRequest::<()>::new();
        assert!(request.cancel());
        assert!(!request.succeed(()));
        assert!(!request.fail());
        assert_eq!(request.status(), Status::Cancelled);
        assert!(request.wait().unwrap_err().is_cancellation());
    }

    #[test]
    fn failure_drops_any_payload() {
        let request = PendingRequest::new();
        request.resolve(Status::Failed, Some(vec![9u8]));
        assert!(matches!(request.wait(), Err(BridgeError::IoFailure)));
    }

    #[test]
    fn interrupt_returns_promptly_and_tolerates_late_resolve() {
        let request = Arc::new(PendingRequest::<Vec<u8>>::new());
        let waiter = {
            let request = Arc::clone(&request);
            thread::spawn(move || request.wait())
        };

        thread::sleep(Duration::from_millis(20));
        request.interrupt();
        assert!(matches!(waiter.join().unwrap(), Err(BridgeError::InterruptedWait)));

        assert!(request.succeed(b"nobody reads this".to_vec()));
        assert_eq!(request.status(), Status::Success);
    }

    #[test]
    fn result_wins_over_racing_interrupt() {
        let request = PendingRequest::new();
        request.succeed(7u32);
        request.interrupt();
        assert_eq!(request.wait().unwrap(), 7);
    }

    #[test]
    fn every_interleaving_delivers_once() {
        for delay_us in [0u64, 10, 100, 1000] {
            let request = Arc::new(PendingRequest::<u64>::new());
            let resolver = {
                let request = Arc::clone(&request);
                thread::spawn(move || {
                    thread::sleep(Duration::from_micros(delay_us));
                    request.succeed(delay_us)
                })
            };
            assert_eq!(request.wait().unwrap(), delay_us);
            assert!(resolver.join().unwrap());
        }
    }
}
