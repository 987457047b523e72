//! Subscriber fan-out for the transaction pool.
//!
//! Each subscriber owns a bounded channel. After a mutation the pool sends
//! the new log length to every channel without waiting:
//!
//! | Channel state | Action                                   |
//! |---------------|------------------------------------------|
//! | has room      | signal delivered                         |
//! | full          | signal skipped, subscriber still pending |
//! | closed        | subscriber pruned                        |
//!
//! A skipped signal loses nothing: the next `read_updates(cursor)` returns
//! every entry the subscriber has not seen.

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Receiving side of one subscription.
#[derive(Debug)]
pub struct SubscriberHandle {
    id: Uuid,
    receiver: mpsc::Receiver<u64>,
}

impl SubscriberHandle {
    /// Token identifying this subscription.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next signal. The value is the log length when it was
    /// sent. Returns `None` once the pool drops the subscription.
    pub async fn recv(&mut self) -> Option<u64> {
        self.receiver.recv().await
    }

    /// Takes a queued signal without waiting.
    pub fn try_recv(&mut self) -> Option<u64> {
        match self.receiver.try_recv() {
            Ok(len) => Some(len),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Registry of subscribers and their channels.
#[derive(Debug)]
pub struct SubscriberHub {
    capacity: usize,
    senders: Mutex<Vec<(Uuid, mpsc::Sender<u64>)>>,
}

impl SubscriberHub {
    /// `capacity` bounds each subscriber's queue.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            senders: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self) -> SubscriberHandle {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = Uuid::new_v4();
        self.senders.lock().push((id, sender));
        debug!(subscriber = %id, "Subscriber registered");
        SubscriberHandle { id, receiver }
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn unregister(&self, id: &Uuid) -> bool {
        let mut senders = self.senders.lock();
        let before = senders.len();
        senders.retain(|(sid, _)| sid != id);
        senders.len() != before
    }

    /// Signals every subscriber that the log now has `log_len` entries.
    ///
    /// Never blocks. Returns the number of signals delivered.
    pub fn notify(&self, log_len: u64) -> usize {
        let mut delivered = 0;
        self.senders.lock().retain(|(id, sender)| match sender.try_send(log_len) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!(subscriber = %id, log_len, "Subscriber queue full, signal skipped");
                true
            }
            Err(TrySendError::Closed(_)) => {
                warn!(subscriber = %id, "Subscriber dropped, pruning");
                false
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().len()
    }
}
