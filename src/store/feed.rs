use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::Versioned;

/// Receiving end of a change feed subscription
pub type FeedReceiver<D> = mpsc::UnboundedReceiver<Versioned<D>>;

/// Fan-out of committed writes, one unbounded queue per subscriber
///
/// A slow subscriber accumulates a backlog instead of losing commits.
/// Queues whose receiver was dropped are pruned on the next publish; the
/// feed closes for every subscriber when the hub is dropped.
pub struct FeedHub<D> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Versioned<D>>>>,
}

impl<D: Clone> FeedHub<D> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> FeedReceiver<D> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().push(sender);
        receiver
    }

    /// Queue `committed` for every live subscriber, returning how many got it
    pub fn publish(&self, committed: &Versioned<D>) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|sender| sender.send(committed.clone()).is_ok());
        if subscribers.is_empty() {
            debug!(id = %committed.id, "No change feed subscribers");
        }
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<Versioned<D>>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<D: Clone> Default for FeedHub<D> {
    fn default() -> Self {
        Self::new()
    }
}
