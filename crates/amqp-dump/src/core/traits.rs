//! Endpoint seams the pipeline core is wired against.
//!
//! Any type implementing [`Source`] or [`Destination`] with the contracts
//! below plugs into the orchestrator; the concrete broker/archive drivers
//! live in [`crate::drivers`].

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::pipeline::ItemSink;

/// Which kind of endpoint a stream of items comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Amqp,
    Archive,
    Memory,
}

/// Facts about a source that downstream stages need: the destination for
/// format negotiation, the transform for its decode branch.
#[derive(Debug, Clone, Copy)]
pub struct SourceInfo {
    pub kind: SourceKind,
}

impl SourceInfo {
    pub fn new(kind: SourceKind) -> Self {
        Self { kind }
    }

    /// Whether items arrive straight off a broker protocol, carrying header
    /// values as raw byte sequences rather than base64 text.
    pub fn is_raw_protocol(&self) -> bool {
        matches!(self.kind, SourceKind::Amqp)
    }
}

/// Produces the stream of messages to transfer.
#[async_trait]
pub trait Source: Send + Sync {
    /// Describe this source for downstream format negotiation.
    fn info(&self) -> SourceInfo;

    /// Push every produced item into `sink`, pacing through the bounded
    /// push, and return once exhausted or cancelled.
    ///
    /// Implementations must check `cancel` between item productions and stop
    /// producing promptly once it fires; items already pushed still drain
    /// normally downstream. The orchestrator closes the buffer as soon as
    /// this returns, so nothing may be left unpushed on a successful return.
    async fn send_data(&self, sink: ItemSink, cancel: CancellationToken) -> Result<()>;

    /// Release held resources. Invoked exactly once by the orchestrator
    /// after the pipeline reaches a terminal state; a failure here is logged
    /// and never changes the run's outcome.
    async fn close(&self) -> Result<()>;
}

/// An open destination writer: the item-accepting endpoint plus the
/// independent completion handle.
///
/// The handle resolves only once the writer has settled all accepted work
/// (flushed buffers, awaited broker acknowledgements), which may be after the
/// last item was pushed. It resolves to an error when the writer fails on
/// its own; the writer must then also stop receiving, so that the fault
/// travels upstream and releases any producer blocked on a full buffer.
pub struct DestinationWriter {
    pub sink: ItemSink,
    pub completion: JoinHandle<Result<()>>,
}

/// Accepts the transferred messages.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Open a writer for a stream produced by the described source.
    async fn open_writer(&self, source: &SourceInfo) -> Result<DestinationWriter>;

    /// Release held resources. Same contract as [`Source::close`].
    async fn close(&self) -> Result<()>;
}
