//! Blocking ingest queue between the capture source and the dispatcher.
//!
//! The queue carries [`QueueItem`]s: either a data item or an explicit
//! end-of-stream marker. A zero-length payload is a legitimate data item and
//! is never mistaken for the marker.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

/// A value travelling through an [`IngestQueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem<T> {
    /// A data item to process
    Data(T),
    /// Tells the consumer to leave its loop
    EndOfStream,
}

impl<T> QueueItem<T> {
    /// Whether this item is the end-of-stream marker
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, QueueItem::EndOfStream)
    }

    /// Extract the data item, if any
    pub fn into_data(self) -> Option<T> {
        match self {
            QueueItem::Data(value) => Some(value),
            QueueItem::EndOfStream => None,
        }
    }
}

/// Unbounded, thread-safe FIFO with a blocking `pop`
///
/// Producers never block beyond the channel's internal lock; each push wakes
/// at most one waiting consumer. The queue is designed for a single logical
/// consumer (the dispatcher).
pub struct IngestQueue<T> {
    tx: Sender<QueueItem<T>>,
    rx: Receiver<QueueItem<T>>,
}

impl<T> IngestQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Append an item
    pub fn push(&self, item: QueueItem<T>) {
        // The queue owns a receiver, so the channel cannot be disconnected.
        let _ = self.tx.send(item);
    }

    /// Append a data item
    pub fn push_data(&self, value: T) {
        self.push(QueueItem::Data(value));
    }

    /// Append the end-of-stream marker
    pub fn push_end_of_stream(&self) {
        self.push(QueueItem::EndOfStream);
    }

    /// Remove the oldest item, waiting until one is available
    pub fn pop(&self) -> QueueItem<T> {
        match self.rx.recv() {
            Ok(item) => item,
            // Unreachable while `self.tx` is alive; ending the stream is the only sane answer.
            Err(_) => QueueItem::EndOfStream,
        }
    }

    /// Remove the oldest item if one is available
    pub fn try_pop(&self) -> Option<QueueItem<T>> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Number of queued items
    ///
    /// Racy by nature; only meant for diagnostics.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is currently empty (diagnostics only)
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Discard every pending item, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

impl<T> Default for IngestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for IngestQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestQueue")
            .field("len", &self.len())
            .finish()
    }
}
