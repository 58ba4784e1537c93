//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where messages are read from.
    pub source: EndpointConfig,

    /// Where messages are written to.
    pub destination: EndpointConfig,

    /// Pipeline behavior configuration.
    #[serde(default)]
    pub options: DumpOptions,
}

/// One end of the transfer: an AMQP broker or an archive dump file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EndpointConfig {
    Amqp(AmqpConfig),
    Archive(ArchiveConfig),
}

/// AMQP broker endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmqpConfig {
    /// Broker URI (amqp:// or amqps://).
    pub uri: String,

    /// Queue to consume from (source role).
    #[serde(default)]
    pub queue: String,

    /// Exchange to publish to (destination role). Empty means the default
    /// exchange, where the routing key names the target queue.
    #[serde(default)]
    pub exchange: String,

    /// Routing key for published messages (destination role).
    #[serde(default)]
    pub routing_key: String,

    /// Consumer prefetch window (default: 64).
    #[serde(default = "default_prefetch")]
    pub prefetch: u16,
}

/// Archive dump-file endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Path to a gzip NDJSON dump file.
    pub path: PathBuf,
}

/// Pipeline behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpOptions {
    /// Upper bound on in-flight items between source and transform stage
    /// (default: 1000). The pipeline's sole backpressure point.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Normalize encoded header properties to plain UTF-8 text in flight.
    #[serde(default)]
    pub decode_encoded_headers: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            decode_encoded_headers: false,
        }
    }
}

fn default_prefetch() -> u16 {
    64
}

fn default_buffer_capacity() -> usize {
    1000
}
