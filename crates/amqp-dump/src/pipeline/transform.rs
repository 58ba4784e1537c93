//! Counting and header-decode stage.
//!
//! A sequential 1:1 map between the source buffer and the destination
//! writer: every item is counted, optionally has its encoded header
//! properties normalized, and is forwarded in arrival order. The stage never
//! reorders, drops, or fans out items.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::task::JoinHandle;
use tracing::debug;

use super::buffer::{ItemReceiver, ItemSink};
use crate::core::{MessageItem, PropertyValue};
use crate::error::{DumpError, Result};

/// Property-name prefix marking headers that may arrive base64- or
/// raw-byte-encoded and are normalized to plain UTF-8 text.
pub const ENCODED_HEADER_PREFIX: &str = "rbs2";

/// Emit a progress line every this many processed items.
const PROGRESS_LOG_INTERVAL: u64 = 1000;

/// The in-flight transform between buffer and destination writer.
pub struct TransformStage {
    decode_encoded_headers: bool,
    raw_protocol_input: bool,
    processed: Arc<AtomicU64>,
}

impl TransformStage {
    pub fn new(decode_encoded_headers: bool, raw_protocol_input: bool) -> Self {
        Self {
            decode_encoded_headers,
            raw_protocol_input,
            processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Share a counter for real-time progress tracking.
    pub fn with_counter(mut self, counter: Arc<AtomicU64>) -> Self {
        self.processed = counter;
        self
    }

    /// Spawn the stage task consuming `input` and feeding `output`.
    ///
    /// The task completes `Ok` after forwarding every item once the input
    /// closes; dropping `output` on return is what propagates completion to
    /// the destination writer. A decode failure or a vanished writer aborts
    /// the task with the corresponding fault, and dropping `input` then
    /// releases any producer blocked on a full buffer.
    pub fn spawn(self, input: ItemReceiver, output: ItemSink) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run(input, output))
    }

    async fn run(self, mut input: ItemReceiver, output: ItemSink) -> Result<()> {
        while let Some(mut item) = input.recv().await {
            let count = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
            if count % PROGRESS_LOG_INTERVAL == 0 {
                debug!("Sent {} messages to destination", count);
            }

            if self.decode_encoded_headers {
                decode_encoded_headers(&mut item, self.raw_protocol_input)?;
            }

            output.push(item).await?;
        }

        Ok(())
    }
}

/// Normalize every `rbs2`-prefixed property of `item` to plain UTF-8 text.
///
/// With raw-protocol input, byte-sequence values are decoded as UTF-8
/// directly; any other value is read as base64 text and decoded to UTF-8.
/// An absent or empty textual form leaves the property untouched. Malformed
/// base64 or invalid UTF-8 is a data-integrity fault and aborts the stage.
pub fn decode_encoded_headers(item: &mut MessageItem, raw_protocol_input: bool) -> Result<()> {
    for (name, value) in item.properties.iter_mut() {
        if !name.starts_with(ENCODED_HEADER_PREFIX) {
            continue;
        }

        if raw_protocol_input {
            if let PropertyValue::Bytes(bytes) = value {
                let text = String::from_utf8(std::mem::take(bytes))
                    .map_err(|e| DumpError::header_decode(name.clone(), e.to_string()))?;
                *value = PropertyValue::Text(text);
                continue;
            }
        }

        let encoded = match &*value {
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::Bytes(b) => std::str::from_utf8(b)
                .map_err(|e| DumpError::header_decode(name.clone(), e.to_string()))?
                .to_string(),
        };
        if encoded.is_empty() {
            continue;
        }

        let decoded = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| DumpError::header_decode(name.clone(), e.to_string()))?;
        let text = String::from_utf8(decoded)
            .map_err(|e| DumpError::header_decode(name.clone(), e.to_string()))?;
        *value = PropertyValue::Text(text);
    }

    Ok(())
}
