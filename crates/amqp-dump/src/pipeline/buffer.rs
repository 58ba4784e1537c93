//! Bounded FIFO buffer linking pipeline stages.
//!
//! The buffer is the pipeline's only backpressure point: a producer pushing
//! into a full buffer suspends until the consumer drains an item. Closing is
//! expressed by dropping every [`ItemSink`] clone; the receiver then drains
//! all buffered items before observing end-of-stream, which is how completion
//! propagates downstream without losing data.

use tokio::sync::mpsc;

use crate::core::MessageItem;
use crate::error::{DumpError, Result};

/// Create a bounded item buffer with the given capacity.
///
/// Capacity must be positive; the orchestrator validates this before wiring
/// the pipeline.
pub fn item_buffer(capacity: usize) -> (ItemSink, ItemReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (ItemSink { tx }, ItemReceiver { rx })
}

/// Producer side of a bounded item buffer.
#[derive(Clone)]
pub struct ItemSink {
    tx: mpsc::Sender<MessageItem>,
}

impl ItemSink {
    /// Push an item, waiting for capacity when the buffer is full.
    ///
    /// Returns [`DumpError::PipelineClosed`] once the consuming stage is gone,
    /// so a producer blocked on a full buffer is released instead of
    /// deadlocking when downstream faults.
    pub async fn push(&self, item: MessageItem) -> Result<()> {
        self.tx
            .send(item)
            .await
            .map_err(|_| DumpError::PipelineClosed)
    }

    /// Blocking variant of [`push`](Self::push) for producers running on a
    /// blocking task (archive file readers).
    pub fn blocking_push(&self, item: MessageItem) -> Result<()> {
        self.tx
            .blocking_send(item)
            .map_err(|_| DumpError::PipelineClosed)
    }
}

/// Consumer side of a bounded item buffer.
pub struct ItemReceiver {
    rx: mpsc::Receiver<MessageItem>,
}

impl ItemReceiver {
    /// Receive the next item, or `None` once the buffer is closed and fully
    /// drained.
    pub async fn recv(&mut self) -> Option<MessageItem> {
        self.rx.recv().await
    }

    /// Blocking variant of [`recv`](Self::recv) for consumers running on a
    /// blocking task (archive file writers).
    pub fn blocking_recv(&mut self) -> Option<MessageItem> {
        self.rx.blocking_recv()
    }
}
