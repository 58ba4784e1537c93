//! End-to-end pipeline behavior over in-memory and bespoke test endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use amqp_dump::drivers::{MemoryDestination, MemorySource};
use amqp_dump::pipeline::{item_buffer, ItemSink};
use amqp_dump::{
    Destination, DestinationWriter, DumpError, DumpOptions, MessageItem, Orchestrator, Result,
    Source, SourceInfo, SourceKind,
};

fn items(count: usize) -> Vec<MessageItem> {
    (0..count)
        .map(|i| MessageItem::new(format!("message-{}", i).into_bytes()))
        .collect()
}

fn options(buffer_capacity: usize) -> DumpOptions {
    DumpOptions {
        buffer_capacity,
        decode_encoded_headers: false,
    }
}

#[tokio::test]
async fn test_order_and_count_preserved() {
    let source = MemorySource::new(items(25));
    let destination = MemoryDestination::new();
    let received = destination.received();

    let orchestrator = Orchestrator::new(Box::new(source), Box::new(destination), options(4));
    let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.messages_transferred, 25);

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 25);
    for (i, item) in received.iter().enumerate() {
        assert_eq!(item.body.as_ref(), format!("message-{}", i).as_bytes());
    }
}

#[tokio::test]
async fn test_encoded_headers_decoded_in_flight() {
    let item = MessageItem::new("body".as_bytes().to_vec())
        .with_property("rbs2-msg-id", "bXNnLTE=")
        .with_property("content-type", "text/plain");

    let source = MemorySource::new(vec![item]);
    let destination = MemoryDestination::new();
    let received = destination.received();

    let orchestrator = Orchestrator::new(
        Box::new(source),
        Box::new(destination),
        DumpOptions {
            buffer_capacity: 4,
            decode_encoded_headers: true,
        },
    );
    orchestrator.run(CancellationToken::new()).await.unwrap();

    let received = received.lock().unwrap();
    assert_eq!(
        received[0]
            .properties
            .get("rbs2-msg-id")
            .and_then(|v| v.as_text()),
        Some("msg-1")
    );
    assert_eq!(
        received[0]
            .properties
            .get("content-type")
            .and_then(|v| v.as_text()),
        Some("text/plain")
    );
}

#[tokio::test]
async fn test_destination_fault_releases_blocked_source() {
    // Far more items than fit in the buffers, so the source is parked on a
    // full buffer when the writer dies.
    let source = MemorySource::new(items(200));
    let destination = MemoryDestination::failing_after(1);

    let orchestrator = Orchestrator::new(Box::new(source), Box::new(destination), options(2));
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        orchestrator.run(CancellationToken::new()),
    )
    .await
    .expect("run deadlocked instead of propagating the destination fault");

    assert!(matches!(outcome.unwrap_err(), DumpError::Destination(_)));
}

#[tokio::test]
async fn test_transform_fault_releases_blocked_source() {
    let mut faulty = items(50);
    faulty[3] = MessageItem::new("x".as_bytes().to_vec()).with_property("rbs2-msg-id", "%%%");

    let source = MemorySource::new(faulty);
    let orchestrator = Orchestrator::new(
        Box::new(source),
        Box::new(MemoryDestination::new()),
        DumpOptions {
            buffer_capacity: 2,
            decode_encoded_headers: true,
        },
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        orchestrator.run(CancellationToken::new()),
    )
    .await
    .expect("run deadlocked instead of propagating the decode fault");

    assert!(matches!(outcome.unwrap_err(), DumpError::HeaderDecode { .. }));
}

/// A source that fails after pushing part of its items.
struct FailingSource {
    emit_before_failure: usize,
}

#[async_trait]
impl Source for FailingSource {
    fn info(&self) -> SourceInfo {
        SourceInfo::new(SourceKind::Memory)
    }

    async fn send_data(&self, sink: ItemSink, _cancel: CancellationToken) -> Result<()> {
        for i in 0..self.emit_before_failure {
            sink.push(MessageItem::new(format!("message-{}", i).into_bytes()))
                .await?;
        }
        Err(DumpError::source("simulated producer failure"))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_producer_fault_still_delivers_accepted_items() {
    let destination = MemoryDestination::new();
    let received = destination.received();

    let orchestrator = Orchestrator::new(
        Box::new(FailingSource {
            emit_before_failure: 3,
        }),
        Box::new(destination),
        options(8),
    );
    let err = orchestrator
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DumpError::Source(_)));
    // Everything the buffer accepted before the fault was still delivered.
    assert_eq!(received.lock().unwrap().len(), 3);
}

/// A destination whose completion handle never resolves.
struct HoldingDestination;

#[async_trait]
impl Destination for HoldingDestination {
    async fn open_writer(&self, _source: &SourceInfo) -> Result<DestinationWriter> {
        let (sink, mut rx) = item_buffer(16);
        let completion = tokio::spawn(async move {
            while rx.recv().await.is_some() {}
            let () = std::future::pending().await;
            Ok(())
        });
        Ok(DestinationWriter { sink, completion })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_success_before_completion_handle_resolves() {
    let orchestrator = Orchestrator::new(
        Box::new(MemorySource::new(items(3))),
        Box::new(HoldingDestination),
        options(4),
    );

    // All items are pushed almost immediately, yet the run must keep
    // polling as long as the completion handle is unresolved.
    let waited = tokio::time::timeout(
        Duration::from_secs(600),
        orchestrator.run(CancellationToken::new()),
    )
    .await;

    assert!(waited.is_err());
}

/// A destination that settles a while after accepting the last item.
struct SlowSettlingDestination {
    settle_delay: Duration,
}

#[async_trait]
impl Destination for SlowSettlingDestination {
    async fn open_writer(&self, _source: &SourceInfo) -> Result<DestinationWriter> {
        let (sink, mut rx) = item_buffer(16);
        let delay = self.settle_delay;
        let completion = tokio::spawn(async move {
            while rx.recv().await.is_some() {}
            tokio::time::sleep(delay).await;
            Ok(())
        });
        Ok(DestinationWriter { sink, completion })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_success_waits_for_slow_settlement() {
    let orchestrator = Orchestrator::new(
        Box::new(MemorySource::new(items(5))),
        Box::new(SlowSettlingDestination {
            settle_delay: Duration::from_secs(12),
        }),
        options(4),
    );

    let summary = orchestrator.run(CancellationToken::new()).await.unwrap();
    assert_eq!(summary.messages_transferred, 5);
}

#[tokio::test]
async fn test_endpoints_closed_once_on_success() {
    let source = MemorySource::new(items(3));
    let destination = MemoryDestination::new();
    let source_closes = source.close_counter();
    let destination_closes = destination.close_counter();

    let orchestrator = Orchestrator::new(Box::new(source), Box::new(destination), options(4));
    orchestrator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(source_closes.load(Ordering::SeqCst), 1);
    assert_eq!(destination_closes.load(Ordering::SeqCst), 1);
}

/// A destination that cannot even open a writer.
struct FailingOpenDestination {
    close_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Destination for FailingOpenDestination {
    async fn open_writer(&self, _source: &SourceInfo) -> Result<DestinationWriter> {
        Err(DumpError::destination("cannot open writer"))
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_endpoints_closed_once_when_setup_fails() {
    let source = MemorySource::new(items(3));
    let source_closes = source.close_counter();
    let destination_closes = Arc::new(AtomicUsize::new(0));

    let orchestrator = Orchestrator::new(
        Box::new(source),
        Box::new(FailingOpenDestination {
            close_calls: destination_closes.clone(),
        }),
        options(4),
    );
    let err = orchestrator
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DumpError::Destination(_)));
    assert_eq!(source_closes.load(Ordering::SeqCst), 1);
    assert_eq!(destination_closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pre_cancelled_run_terminates_cleanly() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let destination = MemoryDestination::new();
    let received = destination.received();

    let orchestrator = Orchestrator::new(
        Box::new(MemorySource::new(items(10))),
        Box::new(destination),
        options(4),
    );
    let summary = orchestrator.run(cancel).await.unwrap();

    assert_eq!(summary.messages_transferred, 0);
    assert!(received.lock().unwrap().is_empty());
}

/// A source that cancels its own token after pushing a few items.
struct CancelAfterSource {
    emit_before_cancel: usize,
    total: usize,
}

#[async_trait]
impl Source for CancelAfterSource {
    fn info(&self) -> SourceInfo {
        SourceInfo::new(SourceKind::Memory)
    }

    async fn send_data(&self, sink: ItemSink, cancel: CancellationToken) -> Result<()> {
        for i in 0..self.total {
            if cancel.is_cancelled() {
                break;
            }
            sink.push(MessageItem::new(format!("message-{}", i).into_bytes()))
                .await?;
            if i + 1 == self.emit_before_cancel {
                cancel.cancel();
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_cancellation_drains_buffered_items() {
    let destination = MemoryDestination::new();
    let received = destination.received();

    let orchestrator = Orchestrator::new(
        Box::new(CancelAfterSource {
            emit_before_cancel: 5,
            total: 50,
        }),
        Box::new(destination),
        options(8),
    );
    let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

    // Intake stopped at the cancellation point, but everything already
    // accepted was delivered and the run reached a terminal state.
    assert_eq!(summary.messages_transferred, 5);
    assert_eq!(received.lock().unwrap().len(), 5);
}
