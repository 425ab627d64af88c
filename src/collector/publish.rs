//! Fire-and-forget fan-out of the latest sample to live subscribers.
//!
//! Each subscriber gets a small bounded channel. Publishing uses `try_send`
//! only: a slow subscriber misses samples, a disconnected one is pruned,
//! and neither ever blocks the collector's write path.

use std::sync::Mutex;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use tracing::trace;

use crate::sample::Sample;

/// Per-subscriber queue depth. Enough to ride out a redraw hiccup at a
/// 1-second cadence without retaining stale history.
const SUBSCRIBER_QUEUE: usize = 8;

/// Broadcast hub for the collector's latest-sample stream.
#[derive(Default)]
pub struct SamplePublisher {
    subscribers: Mutex<Vec<SyncSender<Sample>>>,
}

impl SamplePublisher {
    /// Creates a publisher with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new subscriber and returns its receiving end.
    pub fn subscribe(&self) -> Receiver<Sample> {
        let (tx, rx) = sync_channel(SUBSCRIBER_QUEUE);
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Delivers a sample to every subscriber, best effort. Full queues drop
    /// the sample for that subscriber; disconnected subscribers are removed.
    pub fn publish(&self, sample: &Sample) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| match tx.try_send(sample.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("subscriber queue full, sample not delivered");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
