use crossbeam::channel::Receiver;

use crate::{Snapshot, StorePath};

/// A live view of a subtree, receiving a full snapshot on every
/// intersecting write.
///
/// Unsubscribes when dropped, so an unmounted consumer stops receiving
/// fan-out without any explicit teardown call.
pub struct Subscription {
    path: StorePath,
    receiver: Receiver<Snapshot>,
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        path: StorePath,
        receiver: Receiver<Snapshot>,
        unsubscribe: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Self {
            path,
            receiver,
            unsubscribe: Some(unsubscribe),
        }
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// Blocks until the next snapshot arrives. Returns [None] once the
    /// store side has gone away.
    pub fn recv(&self) -> Option<Snapshot> {
        self.receiver.recv().ok()
    }

    /// Returns the next snapshot if one is already queued.
    pub fn try_recv(&self) -> Option<Snapshot> {
        self.receiver.try_recv().ok()
    }

    /// The underlying channel, for use with `select!` when a consumer
    /// watches more than one subtree at once.
    pub fn receiver(&self) -> &Receiver<Snapshot> {
        &self.receiver
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe()
        }
    }
}
