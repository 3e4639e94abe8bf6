//! Aggregator error types

use thiserror::Error;

use crate::transport::TransportError;

/// Errors raised by the correlation registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Correlation id already registered: {0}")]
    DuplicateKey(String),
}

/// Errors decoding a reply pulled off the results queue
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("Malformed reply: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Reply from {service_id} has an empty correlation id")]
    MissingCorrelationId { service_id: String },
}

/// Errors that abort a single scatter-gather request
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl AggregatorError {
    /// Check if this error points at a correlation id generation bug
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, AggregatorError::Registry(RegistryError::DuplicateKey(_)))
    }
}
