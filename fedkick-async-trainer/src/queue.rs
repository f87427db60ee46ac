use fedkick_core::UpdateRequest;
use std::sync::{Arc, Mutex, MutexGuard};

/// Deltas waiting for upload, shared by the training and flush tasks.
///
/// Cloning gives another handle to the same queue. The contents live in
/// memory only.
#[derive(Clone, Default)]
pub struct OutboundQueue {
    items: Arc<Mutex<Vec<UpdateRequest>>>,
}

impl OutboundQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<UpdateRequest>> {
        // Items are plain data, a panic elsewhere cannot leave them half-written.
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends a delta.
    pub fn push(&self, item: UpdateRequest) {
        self.lock().push(item);
    }

    /// Swaps the contents out, leaving the queue empty.
    pub fn take_all(&self) -> Vec<UpdateRequest> {
        std::mem::take(&mut *self.lock())
    }

    /// Puts entries back in front of anything queued since they were taken.
    pub fn requeue(&self, mut items: Vec<UpdateRequest>) {
        if items.is_empty() {
            return;
        }
        let mut queue = self.lock();
        items.append(&mut queue);
        *queue = items;
    }

    /// Number of queued deltas.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
