//! AMQP broker endpoints.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::spawn;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::AmqpConfig;
use crate::core::{
    Destination, DestinationWriter, MessageItem, PropertyValue, Source, SourceInfo, SourceKind,
};
use crate::error::{DumpError, Result};
use crate::pipeline::{item_buffer, ItemSink};

/// Reply code sent when closing connections cleanly.
const REPLY_SUCCESS: u16 = 200;

/// Capacity of the channel between the transform stage and the publisher.
const WRITER_CHANNEL_CAPACITY: usize = 64;

/// Consumes the backlog of a broker queue.
///
/// The backlog is snapshotted with a passive queue declare when the source
/// is opened; the dump drains exactly that many messages (or fewer, when
/// cancelled) so a queue that keeps receiving traffic still yields a
/// terminating run. Messages are acknowledged only after the bounded push
/// accepts them, so an aborted run leaves the remainder requeued.
pub struct AmqpSource {
    connection: Connection,
    channel: Channel,
    queue: String,
    backlog: u32,
}

impl AmqpSource {
    /// Connect to the broker and snapshot the queue backlog.
    pub async fn connect(config: &AmqpConfig) -> Result<Self> {
        let connection =
            Connection::connect(&config.uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .basic_qos(config.prefetch, BasicQosOptions::default())
            .await?;

        let queue = channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    passive: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        let backlog = queue.message_count();

        info!("Queue '{}' holds {} messages", config.queue, backlog);

        Ok(Self {
            connection,
            channel,
            queue: config.queue.clone(),
            backlog,
        })
    }
}

#[async_trait]
impl Source for AmqpSource {
    fn info(&self) -> SourceInfo {
        SourceInfo::new(SourceKind::Amqp)
    }

    async fn send_data(&self, sink: ItemSink, cancel: CancellationToken) -> Result<()> {
        if self.backlog == 0 {
            return Ok(());
        }

        let mut consumer = self
            .channel
            .basic_consume(
                &self.queue,
                "amqp-dump",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let mut remaining = self.backlog;
        while remaining > 0 && !cancel.is_cancelled() {
            let delivery = tokio::select! {
                next = consumer.next() => match next {
                    Some(delivery) => delivery?,
                    None => {
                        return Err(DumpError::source(
                            "consumer stream ended before the queue backlog was drained",
                        ))
                    }
                },
                () = cancel.cancelled() => break,
            };

            sink.push(delivery_to_item(&delivery)).await?;
            delivery.ack(BasicAckOptions::default()).await?;
            remaining -= 1;
        }

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.connection.close(REPLY_SUCCESS, "").await?;
        Ok(())
    }
}

/// Publishes items to a broker exchange with publisher confirms.
pub struct AmqpDestination {
    connection: Connection,
    channel: Channel,
    exchange: String,
    routing_key: String,
}

impl AmqpDestination {
    /// Connect to the broker and enable publisher confirms.
    pub async fn connect(config: &AmqpConfig) -> Result<Self> {
        let connection =
            Connection::connect(&config.uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        Ok(Self {
            connection,
            channel,
            exchange: config.exchange.clone(),
            routing_key: config.routing_key.clone(),
        })
    }
}

#[async_trait]
impl Destination for AmqpDestination {
    async fn open_writer(&self, _source: &SourceInfo) -> Result<DestinationWriter> {
        let (sink, mut rx) = item_buffer(WRITER_CHANNEL_CAPACITY);
        let channel = self.channel.clone();
        let exchange = self.exchange.clone();
        let routing_key = self.routing_key.clone();

        // The completion handle resolves only after the last publish was
        // confirmed by the broker; a publish or confirm failure ends the
        // task, dropping the receiver and releasing upstream stages.
        let completion = spawn(async move {
            while let Some(item) = rx.recv().await {
                let confirm = channel
                    .basic_publish(
                        &exchange,
                        &routing_key,
                        BasicPublishOptions::default(),
                        &item.body,
                        item_to_properties(&item),
                    )
                    .await?;
                confirm.await?;
            }
            Ok(())
        });

        Ok(DestinationWriter { sink, completion })
    }

    async fn close(&self) -> Result<()> {
        self.connection.close(REPLY_SUCCESS, "").await?;
        Ok(())
    }
}

/// Convert a broker delivery into a transfer item.
///
/// Header values stay wire-faithful: long strings and byte arrays arrive as
/// byte sequences (the raw-protocol shape the decode pass expects), short
/// strings as text. Header types outside the text-or-bytes data model are
/// skipped.
fn delivery_to_item(delivery: &Delivery) -> MessageItem {
    let mut item = MessageItem::new(delivery.data.clone());

    if let Some(headers) = delivery.properties.headers() {
        for (name, value) in headers.inner() {
            let converted = match value {
                AMQPValue::LongString(s) => Some(PropertyValue::Bytes(s.as_bytes().to_vec())),
                AMQPValue::ByteArray(b) => Some(PropertyValue::Bytes(b.as_slice().to_vec())),
                AMQPValue::ShortString(s) => Some(PropertyValue::Text(s.as_str().to_string())),
                other => {
                    debug!("Skipping header '{}' with unsupported type {:?}", name, other);
                    None
                }
            };
            if let Some(value) = converted {
                item.properties.insert(name.as_str().to_string(), value);
            }
        }
    }

    item
}

/// Build publish properties carrying the item's properties as headers.
fn item_to_properties(item: &MessageItem) -> BasicProperties {
    let mut headers = FieldTable::default();
    for (name, value) in &item.properties {
        let amqp_value = match value {
            PropertyValue::Text(s) => AMQPValue::LongString(s.clone().into()),
            PropertyValue::Bytes(b) => AMQPValue::ByteArray(b.clone().into()),
        };
        headers.insert(name.clone().into(), amqp_value);
    }
    BasicProperties::default().with_headers(headers)
}
