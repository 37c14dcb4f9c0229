// Waiters: the two halves of one lock request.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaiterId(u64);

impl WaiterId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WaiterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The queue dropped a waiter without ever waking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("lock request abandoned by queue")]
pub struct Abandoned;

/// Caller side of an enqueued lock request.
///
/// Holds the receiving end of the wake signal. The request stays in the
/// queue until it is passed back to [`LockQueue::dequeue`](super::LockQueue::dequeue).
#[derive(Debug)]
pub struct Waiter {
    id: WaiterId,
    shared: bool,
    grant: Option<oneshot::Receiver<()>>,
}

impl Waiter {
    pub fn id(&self) -> WaiterId {
        self.id
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Resolves once the queue has woken this waiter.
    ///
    /// Cancel safe: dropping the future before it resolves leaves the signal
    /// pending for the next call. Once resolved, later calls return at once.
    pub async fn granted(&mut self) -> Result<(), Abandoned> {
        let Some(rx) = self.grant.as_mut() else {
            return Ok(());
        };
        let res = rx.await;
        self.grant = None;
        res.map_err(|_| Abandoned)
    }

    /// Non-blocking check of the wake signal.
    pub fn is_granted(&mut self) -> bool {
        let Some(rx) = self.grant.as_mut() else {
            return true;
        };
        match rx.try_recv() {
            Ok(()) => {
                self.grant = None;
                true
            }
            Err(_) => false,
        }
    }
}

/// Queue side of a lock request.
pub(super) struct Entry {
    pub(super) id: WaiterId,
    pub(super) shared: bool,
    pub(super) woken: bool,
    pub(super) label: String,
    wake: Option<oneshot::Sender<()>>,
}

impl Entry {
    /// Creates both halves of a new request.
    pub(super) fn pair(shared: bool, label: String) -> (Entry, Waiter) {
        let (tx, rx) = oneshot::channel();
        let id = WaiterId::next();
        let entry = Entry {
            id,
            shared,
            woken: false,
            label,
            wake: Some(tx),
        };
        let waiter = Waiter {
            id,
            shared,
            grant: Some(rx),
        };
        (entry, waiter)
    }

    /// Marks the entry woken and hands out its wake signal. Only the first
    /// call returns a sender.
    pub(super) fn wake(&mut self) -> Option<oneshot::Sender<()>> {
        if self.woken {
            return None;
        }
        self.woken = true;
        self.wake.take()
    }
}

/// Wake signals collected under the queue mutex, fired once it is released.
#[must_use = "wake signals must be fired"]
#[derive(Default)]
pub(super) struct Wakeups(Vec<oneshot::Sender<()>>);

impl Wakeups {
    pub(super) fn push(&mut self, tx: Option<oneshot::Sender<()>>) {
        self.0.extend(tx);
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.0.len()
    }

    pub(super) fn fire(self) {
        for tx in self.0 {
            // The receiver may already be gone if the session is closing.
            let _ = tx.send(());
        }
    }
}
