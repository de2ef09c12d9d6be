//! Trade Queue
//!
//! Bounded FIFO hand-off between the producer and the dispatcher. A full
//! queue stalls the producer instead of dropping trades, so backpressure
//! reaches the transport read cadence.

use tokio::sync::mpsc;

use crate::domain::trade::TradeEvent;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Queue errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The dispatcher side is gone.
    #[error("trade queue closed")]
    Closed,
}

/// Bounded trade queue constructor.
pub struct TradeQueue;

impl TradeQueue {
    /// Create a bounded queue and return its two ends.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn bounded(capacity: usize) -> (TradeQueueSender, TradeQueueReceiver) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        (
            TradeQueueSender { tx, capacity },
            TradeQueueReceiver { rx, capacity },
        )
    }
}

/// Producer end of the trade queue.
#[derive(Debug, Clone)]
pub struct TradeQueueSender {
    tx: mpsc::Sender<TradeEvent>,
    capacity: usize,
}

impl TradeQueueSender {
    /// Push a trade, waiting for free capacity.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the receiver was dropped.
    pub async fn push(&self, trade: TradeEvent) -> Result<(), QueueError> {
        self.tx.send(trade).await.map_err(|_| QueueError::Closed)
    }

    /// Fixed capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued trades.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the receiver was dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Dispatcher end of the trade queue.
#[derive(Debug)]
pub struct TradeQueueReceiver {
    rx: mpsc::Receiver<TradeEvent>,
    capacity: usize,
}

impl TradeQueueReceiver {
    /// Receive the next trade in FIFO order.
    ///
    /// Returns `None` once every sender is dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<TradeEvent> {
        self.rx.recv().await
    }

    /// Fixed capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued trades.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
