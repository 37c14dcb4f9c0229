// FIFO lock queue with exclusive and shared holders.

use parking_lot::Mutex;
use tracing::debug;

use super::waiter::{Entry, Wakeups, Waiter};

/// The single lock every session competes for.
///
/// All state lives behind one mutex. It is held only for the O(n) wake-set
/// recomputation and never across an await; wake signals go out after it is
/// released.
pub struct LockQueue {
    q: Mutex<Vec<Entry>>,
}

impl LockQueue {
    pub fn new() -> Self {
        Self {
            q: Mutex::new(Vec::with_capacity(16)),
        }
    }

    /// Appends a request at the tail.
    ///
    /// With `nonblocking` set, a request that cannot run right away is removed
    /// again inside the same critical section and `None` is returned.
    pub fn enqueue(&self, shared: bool, nonblocking: bool, label: impl Into<String>) -> Option<Waiter> {
        let (entry, waiter) = Entry::pair(shared, label.into());

        let mut q = self.q.lock();
        q.push(entry);
        let wakeups = wake_heads(&mut q);

        if nonblocking && !q.last().map_or(false, |e| e.woken) {
            q.pop();
            drop(q);
            wakeups.fire();
            debug!(
                component = "lock",
                event = "acquire_denied",
                waiter = %waiter.id(),
                shared,
                "non-blocking acquire denied"
            );
            return None;
        }

        crate::metrics::set_queue_length(q.len());
        drop(q);
        wakeups.fire();
        Some(waiter)
    }

    /// Removes a request, granted or not, and wakes whoever is next.
    ///
    /// # Panics
    ///
    /// Panics if the waiter is not in the queue. That can only happen through a
    /// logic error in the caller.
    pub fn dequeue(&self, waiter: &Waiter) {
        let mut q = self.q.lock();
        let Some(pos) = q.iter().position(|e| e.id == waiter.id()) else {
            drop(q);
            panic!("dequeue of non-enqueued waiter {}", waiter.id());
        };
        q.remove(pos);
        let wakeups = wake_heads(&mut q);
        crate::metrics::set_queue_length(q.len());
        drop(q);
        wakeups.fire();
    }

    /// Labels of every queued request, head first.
    pub fn snapshot(&self) -> Vec<String> {
        self.q.lock().iter().map(|e| e.label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.q.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.lock().is_empty()
    }

    /// Number of requests currently allowed to run.
    pub fn holders(&self) -> usize {
        self.q.lock().iter().filter(|e| e.woken).count()
    }
}

impl Default for LockQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Wakes the head if exclusive, or the contiguous run of shared requests
/// starting at the head. Returns the signals of newly woken entries.
pub(super) fn wake_heads(q: &mut [Entry]) -> Wakeups {
    let mut wakeups = Wakeups::default();
    let Some(head) = q.first_mut() else {
        return wakeups;
    };
    if !head.shared {
        wakeups.push(head.wake());
        return wakeups;
    }
    for entry in q.iter_mut().take_while(|e| e.shared) {
        wakeups.push(entry.wake());
    }
    wakeups
}
