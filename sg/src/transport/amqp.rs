//! RabbitMQ transport
//!
//! Requests go to a durable fan-out exchange; every worker binds its own queue
//! to it. Replies come back on one durable results queue, consumed with
//! auto-ack.

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueDeclareOptions};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::error::TransportError;
use super::{JSON_CONTENT_TYPE, RawReply, ReplyStream, Transport};
use crate::aggregator::RequestMessage;
use crate::config::BrokerConfig;

const CONSUMER_TAG: &str = "scatter-gateway";

pub struct AmqpTransport {
    exchange: String,
    results_queue: String,
    connection: Connection,
    channel: Channel,
    consumer: Mutex<Option<Consumer>>,
}

impl AmqpTransport {
    /// Connect, declare the topology and start consuming the results queue
    pub async fn connect(config: &BrokerConfig) -> Result<Self, TransportError> {
        info!(broker = %config.redacted_url(), "Connecting to AMQP broker");
        let connection = Connection::connect(&config.url(), ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_declare(
                &config.results_queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        info!(exchange = %config.exchange, results_queue = %config.results_queue, "Declared exchange and results queue");

        let consumer = channel
            .basic_consume(
                &config.results_queue,
                CONSUMER_TAG,
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        Ok(Self {
            exchange: config.exchange.clone(),
            results_queue: config.results_queue.clone(),
            connection,
            channel,
            consumer: Mutex::new(Some(consumer)),
        })
    }

    /// Close the channel and the connection
    pub async fn close(&self) -> Result<(), TransportError> {
        info!(exchange = %self.exchange, "Closing AMQP connection");
        self.channel.close(200, "gateway shutdown").await?;
        self.connection.close(200, "gateway shutdown").await?;
        Ok(())
    }
}

fn raw_reply(body: Vec<u8>, properties: &BasicProperties) -> RawReply {
    RawReply {
        body,
        content_type: properties.content_type().as_ref().map(|ct| ct.as_str().to_string()),
        received_at: Utc::now(),
    }
}

#[async_trait]
impl Transport for AmqpTransport {
    async fn publish(&self, message: &RequestMessage) -> Result<(), TransportError> {
        let body = serde_json::to_vec(message)?;
        self.channel
            .basic_publish(
                &self.exchange,
                "",
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_content_type(ShortString::from(JSON_CONTENT_TYPE)),
            )
            .await?;
        debug!(correlation_id = %message.correlation_id, exchange = %self.exchange, "Published request");
        Ok(())
    }

    fn replies(&self) -> Result<ReplyStream, TransportError> {
        let consumer = self.consumer.lock().take().ok_or(TransportError::AlreadyConsumed)?;
        debug!(results_queue = %self.results_queue, "AmqpTransport::replies: consumer attached");
        let queue = self.results_queue.clone();
        Ok(consumer
            .filter_map(move |delivery| {
                let reply = match delivery {
                    Ok(Delivery { data, properties, .. }) => Some(raw_reply(data, &properties)),
                    Err(e) => {
                        warn!(results_queue = %queue, error = %e, "Consumer error, delivery skipped");
                        None
                    }
                };
                futures::future::ready(reply)
            })
            .boxed())
    }
}
