// src/queue.rs

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::debug;

/// Producer end of a bounded channel. Offers never block: when the channel
/// is full the new item is dropped and the producer carries on.
#[derive(Debug, Clone)]
pub struct Outbox<T> {
    name: &'static str,
    tx: Sender<T>,
}

impl<T> Outbox<T> {
    /// Returns whether the item was queued.
    pub fn offer(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(queue = self.name, "QUEUE FULL: dropped newest item");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(queue = self.name, "queue closed, item discarded");
                false
            }
        }
    }
}

pub fn channel<T>(name: &'static str, capacity: usize) -> (Outbox<T>, Receiver<T>) {
    let (tx, rx) = bounded(capacity);
    (Outbox { name, tx }, rx)
}
