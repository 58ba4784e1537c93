//! In-memory endpoints for tests and wiring checks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::spawn;
use tokio_util::sync::CancellationToken;

use crate::core::{
    Destination, DestinationWriter, MessageItem, Source, SourceInfo, SourceKind,
};
use crate::error::{DumpError, Result};
use crate::pipeline::{item_buffer, ItemSink};

const WRITER_CHANNEL_CAPACITY: usize = 16;

/// A source producing a fixed list of items.
pub struct MemorySource {
    items: Mutex<Vec<MessageItem>>,
    close_calls: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new(items: Vec<MessageItem>) -> Self {
        Self {
            items: Mutex::new(items),
            close_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle counting how often `close` ran; keep a clone before boxing.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        self.close_calls.clone()
    }
}

#[async_trait]
impl Source for MemorySource {
    fn info(&self) -> SourceInfo {
        SourceInfo::new(SourceKind::Memory)
    }

    async fn send_data(&self, sink: ItemSink, cancel: CancellationToken) -> Result<()> {
        let items = std::mem::take(&mut *self.items.lock().expect("source items poisoned"));

        for item in items {
            if cancel.is_cancelled() {
                break;
            }
            sink.push(item).await?;
        }

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A destination collecting received items.
pub struct MemoryDestination {
    received: Arc<Mutex<Vec<MessageItem>>>,
    fail_after: Option<usize>,
    close_calls: Arc<AtomicUsize>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
            fail_after: None,
            close_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A destination whose writer accepts `count` items, then fails.
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::new()
        }
    }

    /// Handle on the items the writer accepted; keep a clone before boxing.
    pub fn received(&self) -> Arc<Mutex<Vec<MessageItem>>> {
        self.received.clone()
    }

    /// Handle counting how often `close` ran; keep a clone before boxing.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        self.close_calls.clone()
    }
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    async fn open_writer(&self, _source: &SourceInfo) -> Result<DestinationWriter> {
        let (sink, mut rx) = item_buffer(WRITER_CHANNEL_CAPACITY);
        let received = self.received.clone();
        let fail_after = self.fail_after;

        let completion = spawn(async move {
            let mut accepted = 0usize;
            while let Some(item) = rx.recv().await {
                if fail_after.is_some_and(|limit| accepted >= limit) {
                    return Err(DumpError::destination("simulated write failure"));
                }
                received.lock().expect("received items poisoned").push(item);
                accepted += 1;
            }
            Ok(())
        });

        Ok(DestinationWriter { sink, completion })
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
