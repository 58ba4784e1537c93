//! Streaming pipeline building blocks.
//!
//! - [`item_buffer`]: the bounded, backpressured channel between stages
//! - [`TransformStage`]: the counting and header-decode stage
//!
//! Stages are linked with propagate-completion semantics: a stage closes its
//! output only after forwarding everything it accepted, and a fault anywhere
//! tears the channel chain down so no stage blocks forever.

mod buffer;
mod transform;

pub use buffer::{item_buffer, ItemReceiver, ItemSink};
pub use transform::{decode_encoded_headers, TransformStage, ENCODED_HEADER_PREFIX};
