//! Archive dump-file endpoints.
//!
//! A dump file is gzip-compressed NDJSON: one record per message, with the
//! body and byte-valued properties base64-encoded. Text values, including
//! the encoded header properties the transform pass can normalize, are
//! stored verbatim.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;

use crate::config::ArchiveConfig;
use crate::core::{
    Destination, DestinationWriter, MessageItem, PropertyValue, Source, SourceInfo, SourceKind,
};
use crate::error::{DumpError, Result};
use crate::pipeline::{item_buffer, ItemSink};

/// Capacity of the channel between the transform stage and the file writer.
const WRITER_CHANNEL_CAPACITY: usize = 64;

/// One message as stored in a dump file.
#[derive(Debug, Serialize, Deserialize)]
struct ArchiveRecord {
    #[serde(default)]
    properties: BTreeMap<String, ArchiveValue>,

    /// Base64-encoded message payload.
    body: String,
}

/// A property value as stored in a dump file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
enum ArchiveValue {
    Text(String),
    /// Base64-encoded raw bytes.
    Bytes(String),
}

impl From<&MessageItem> for ArchiveRecord {
    fn from(item: &MessageItem) -> Self {
        let properties = item
            .properties
            .iter()
            .map(|(name, value)| {
                let stored = match value {
                    PropertyValue::Text(s) => ArchiveValue::Text(s.clone()),
                    PropertyValue::Bytes(b) => ArchiveValue::Bytes(BASE64.encode(b)),
                };
                (name.clone(), stored)
            })
            .collect();

        Self {
            properties,
            body: BASE64.encode(&item.body),
        }
    }
}

fn record_to_item(record: ArchiveRecord) -> Result<MessageItem> {
    let body = BASE64
        .decode(record.body.as_bytes())
        .map_err(|e| DumpError::source(format!("corrupt archive record body: {}", e)))?;

    let mut item = MessageItem::new(body);
    for (name, stored) in record.properties {
        let value = match stored {
            ArchiveValue::Text(s) => PropertyValue::Text(s),
            ArchiveValue::Bytes(encoded) => {
                let bytes = BASE64.decode(encoded.as_bytes()).map_err(|e| {
                    DumpError::source(format!("corrupt archive property '{}': {}", name, e))
                })?;
                PropertyValue::Bytes(bytes)
            }
        };
        item.properties.insert(name, value);
    }

    Ok(item)
}

/// Reads messages back out of a dump file.
#[derive(Debug)]
pub struct ArchiveSource {
    path: PathBuf,
}

impl ArchiveSource {
    /// Open an existing dump file for reading.
    pub fn open(config: &ArchiveConfig) -> Result<Self> {
        if !config.path.is_file() {
            return Err(DumpError::Config(format!(
                "archive not found: {}",
                config.path.display()
            )));
        }
        Ok(Self {
            path: config.path.clone(),
        })
    }
}

#[async_trait]
impl Source for ArchiveSource {
    fn info(&self) -> SourceInfo {
        SourceInfo::new(SourceKind::Archive)
    }

    async fn send_data(&self, sink: ItemSink, cancel: CancellationToken) -> Result<()> {
        let path = self.path.clone();

        // File IO is synchronous; the reader runs on a blocking task and
        // pushes through the blocking side of the bounded buffer.
        let reader = spawn_blocking(move || -> Result<()> {
            let file = File::open(&path)?;
            let lines = BufReader::new(GzDecoder::new(file)).lines();

            for line in lines {
                if cancel.is_cancelled() {
                    break;
                }

                let line = line?;
                if line.is_empty() {
                    continue;
                }

                let record: ArchiveRecord = serde_json::from_str(&line)?;
                sink.blocking_push(record_to_item(record)?)?;
            }

            Ok(())
        });

        reader
            .await
            .map_err(|e| DumpError::source(format!("archive reader panicked: {}", e)))?
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Writes messages into a dump file.
pub struct ArchiveDestination {
    path: PathBuf,
}

impl ArchiveDestination {
    pub fn create(config: &ArchiveConfig) -> Self {
        Self {
            path: config.path.clone(),
        }
    }
}

#[async_trait]
impl Destination for ArchiveDestination {
    async fn open_writer(&self, _source: &SourceInfo) -> Result<DestinationWriter> {
        let (sink, mut rx) = item_buffer(WRITER_CHANNEL_CAPACITY);
        let path = self.path.clone();

        // The completion handle resolves only after the gzip stream is
        // finished and flushed; an IO fault ends the task, dropping the
        // receiver and releasing upstream stages.
        let completion = spawn_blocking(move || -> Result<()> {
            let file = File::create(&path)?;
            let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());

            while let Some(item) = rx.blocking_recv() {
                serde_json::to_writer(&mut encoder, &ArchiveRecord::from(&item))?;
                encoder.write_all(b"\n")?;
            }

            encoder.finish()?.flush()?;
            Ok(())
        });

        Ok(DestinationWriter { sink, completion })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
