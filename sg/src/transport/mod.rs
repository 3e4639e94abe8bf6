//! Publish/subscribe transport boundary
//!
//! The aggregator only needs to publish a request to every worker and read an
//! endless stream of replies. [`MemoryBroker`] provides both in-process and
//! [`AmqpTransport`] over RabbitMQ.

mod amqp;
mod error;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::aggregator::RequestMessage;

pub use amqp::AmqpTransport;
pub use error::TransportError;
pub use memory::{MemoryBroker, ResultsPublisher};

/// Content type used for every message body on the bus
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Undecoded reply as delivered by the results queue
#[derive(Debug, Clone)]
pub struct RawReply {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl RawReply {
    /// Wrap a JSON body, stamped with the current time
    pub fn json(body: Vec<u8>) -> Self {
        Self {
            body,
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
            received_at: Utc::now(),
        }
    }
}

/// Endless stream of replies from the results queue
pub type ReplyStream = BoxStream<'static, RawReply>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Broadcast a request to every bound worker queue
    ///
    /// Fire-and-forget: success says nothing about worker receipt.
    async fn publish(&self, message: &RequestMessage) -> Result<(), TransportError>;

    /// Take the reply stream; only one consumer may hold it
    fn replies(&self) -> Result<ReplyStream, TransportError>;
}
