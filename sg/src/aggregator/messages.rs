//! Wire types exchanged with workers and returned to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ReplyError;
use crate::transport::RawReply;

/// Generate a fresh correlation id for a new request
pub fn new_correlation_id() -> String {
    Uuid::now_v7().to_string()
}

/// Message published to the fan-out exchange, one per client request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub correlation_id: String,

    /// Unix seconds at which the request was issued
    pub timestamp: i64,
}

impl RequestMessage {
    pub fn new(correlation_id: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            timestamp: issued_at.timestamp(),
        }
    }
}

/// A single worker reply as it travels back through the results queue
///
/// `data` is opaque to the aggregator: it is routed, never inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub service_id: String,
    pub correlation_id: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ServiceResponse {
    /// Decode a raw reply body
    pub fn decode(raw: &RawReply) -> Result<Self, ReplyError> {
        let reply: Self = serde_json::from_slice(&raw.body)?;
        if reply.correlation_id.is_empty() {
            return Err(ReplyError::MissingCorrelationId {
                service_id: reply.service_id,
            });
        }
        Ok(reply)
    }
}

/// Body returned to the client once collection finishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResponse {
    pub request_id: String,

    /// Replies in arrival order
    pub responses: Vec<ServiceResponse>,
    pub count: usize,

    /// True when the deadline elapsed before the quorum was met
    pub timeout: bool,
}

impl AggregatedResponse {
    pub fn new(request_id: impl Into<String>, responses: Vec<ServiceResponse>, timed_out: bool) -> Self {
        Self {
            request_id: request_id.into(),
            count: responses.len(),
            responses,
            timeout: timed_out,
        }
    }
}
