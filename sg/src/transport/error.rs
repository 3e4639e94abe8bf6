//! Transport error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Broker is closed")]
    Closed,

    #[error("Results queue '{0}' is closed")]
    ResultsQueueClosed(String),

    #[error("Reply stream already consumed")]
    AlreadyConsumed,

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),
}
