//! Aggregator configuration

use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Quorum, deadline and buffering limits applied to every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Replies needed to answer before the deadline
    #[serde(rename = "min-replies", default = "default_min_replies")]
    pub min_replies: usize,

    /// Per-request deadline in milliseconds
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Replies buffered per request before new arrivals are dropped
    #[serde(rename = "mailbox-capacity", default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn default_min_replies() -> usize {
    2
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_mailbox_capacity() -> usize {
    10
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            min_replies: default_min_replies(),
            timeout_ms: default_timeout_ms(),
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

impl AggregatorConfig {
    /// Get the per-request deadline as a Duration
    pub fn timeout(&self) -> Duration {
        debug!(timeout_ms = %self.timeout_ms, "AggregatorConfig::timeout: called");
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject combinations the collector cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.mailbox_capacity == 0 {
            return Err(eyre!("mailbox-capacity must be at least 1"));
        }
        if self.mailbox_capacity < self.min_replies {
            return Err(eyre!(
                "mailbox-capacity ({}) must be >= min-replies ({})",
                self.mailbox_capacity,
                self.min_replies
            ));
        }
        if self.timeout_ms == 0 {
            return Err(eyre!("timeout-ms must be greater than zero"));
        }
        Ok(())
    }
}
