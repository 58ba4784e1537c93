//! Dump orchestrator - wires the pipeline and drives it to a terminal state.
//!
//! The orchestrator owns both endpoints for their whole lifetime: it links
//! source → bounded buffer → transform stage → destination writer with
//! propagate-completion semantics, drives the source's send loop, waits for
//! the destination's completion handle, and guarantees that both endpoints
//! are closed exactly once whichever way the run ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DumpOptions;
use crate::core::{Destination, Source};
use crate::error::{DumpError, Result};
use crate::pipeline::{item_buffer, TransformStage};

/// How long to wait on the destination's completion handle between
/// "still waiting" diagnostics.
const COMPLETION_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Dump orchestrator.
pub struct Orchestrator {
    source: Box<dyn Source>,
    destination: Box<dyn Destination>,
    options: DumpOptions,
}

/// Result of a completed dump run.
#[derive(Debug, Clone)]
pub struct DumpSummary {
    /// Messages that passed through the transform stage.
    pub messages_transferred: u64,

    /// Total wall-clock duration of the run.
    pub duration: Duration,
}

impl DumpSummary {
    /// Average throughput over the whole run.
    pub fn messages_per_second(&self) -> u64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            (self.messages_transferred as f64 / secs) as u64
        } else {
            0
        }
    }
}

impl Orchestrator {
    /// Create a new orchestrator over the given endpoints.
    pub fn new(
        source: Box<dyn Source>,
        destination: Box<dyn Destination>,
        options: DumpOptions,
    ) -> Self {
        Self {
            source,
            destination,
            options,
        }
    }

    /// Run the dump to a terminal state.
    ///
    /// Returns the summary on success or the first fault the pipeline hit.
    /// Both endpoints are closed exactly once before this returns, on every
    /// path; a close failure is logged and does not change the outcome.
    pub async fn run(self, cancel: CancellationToken) -> Result<DumpSummary> {
        let started = Instant::now();
        let processed = Arc::new(AtomicU64::new(0));

        let outcome = self.transfer(cancel, processed.clone()).await;

        // Endpoint teardown happens exactly once, whatever the outcome.
        if let Err(e) = self.source.close().await {
            warn!("Failed to close source: {}", e);
        }
        if let Err(e) = self.destination.close().await {
            warn!("Failed to close destination: {}", e);
        }

        let count = processed.load(Ordering::Relaxed);
        match outcome {
            Ok(()) => {
                info!("Copied {} messages from source to destination", count);
                Ok(DumpSummary {
                    messages_transferred: count,
                    duration: started.elapsed(),
                })
            }
            Err(e) => {
                error!("Error while copying data: {}", e);
                Err(e)
            }
        }
    }

    async fn transfer(&self, cancel: CancellationToken, processed: Arc<AtomicU64>) -> Result<()> {
        debug!("Begin moving data");

        let source_info = self.source.info();
        let (buffer_tx, buffer_rx) = item_buffer(self.options.buffer_capacity);

        let writer = self.destination.open_writer(&source_info).await?;

        let transform = TransformStage::new(
            self.options.decode_encoded_headers,
            source_info.is_raw_protocol(),
        )
        .with_counter(processed)
        .spawn(buffer_rx, writer.sink);

        // The source paces itself through the bounded push; once it returns,
        // dropping the sink closes the buffer and completion propagates down
        // the chain.
        let send_result = self.source.send_data(buffer_tx, cancel).await;

        let transform_result = match transform.await {
            Ok(result) => result,
            Err(e) => Err(DumpError::transfer(format!(
                "transform stage panicked: {}",
                e
            ))),
        };

        // Fault precedence: a transform fault explains the closed push the
        // source saw, and a writer fault explains the closed channel the
        // transform saw. A PipelineClosed from a stage therefore defers to
        // the stage below it.
        match transform_result {
            Err(DumpError::PipelineClosed) => {}
            Err(e) => return Err(e),
            Ok(()) => {}
        }

        Self::wait_for_writer(writer.completion).await?;

        send_result
    }

    /// Wait for the destination's completion handle, logging a diagnostic
    /// every poll window instead of blocking unobservably.
    async fn wait_for_writer(mut completion: JoinHandle<Result<()>>) -> Result<()> {
        loop {
            match timeout(COMPLETION_POLL_INTERVAL, &mut completion).await {
                Ok(Ok(result)) => return result,
                Ok(Err(e)) => {
                    return Err(DumpError::transfer(format!(
                        "destination writer panicked: {}",
                        e
                    )))
                }
                Err(_) => debug!("Waiting for destination to complete"),
            }
        }
    }
}
