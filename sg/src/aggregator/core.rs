//! Aggregator - runs one scatter-gather request end to end

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::collector::collect_until;
use super::config::AggregatorConfig;
use super::dispatcher::Dispatcher;
use super::error::AggregatorError;
use super::messages::{AggregatedResponse, RequestMessage, new_correlation_id};
use super::metrics::{AggregatorMetrics, Counters};
use super::registry::CorrelationRegistry;
use crate::transport::{Transport, TransportError};

/// Lifecycle of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    New,
    Published,
    Collecting,
    QuorumMet,
    TimedOut,
    Done,
}

/// Removes the registry entry when the request leaves scope, on every path
struct Registration<'a> {
    registry: &'a CorrelationRegistry,
    correlation_id: &'a str,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.unregister(self.correlation_id);
        debug!(correlation_id = %self.correlation_id, state = ?RequestState::Done, "Request released");
    }
}

pub struct Aggregator {
    config: AggregatorConfig,
    registry: Arc<CorrelationRegistry>,
    transport: Arc<dyn Transport>,
    counters: Arc<Counters>,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig, transport: Arc<dyn Transport>) -> Self {
        let registry = Arc::new(CorrelationRegistry::new(config.mailbox_capacity));
        Self {
            config,
            registry,
            transport,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    /// Build a dispatcher sharing this aggregator's registry and counters
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.registry.clone(), self.counters.clone())
    }

    /// Attach to the transport's reply stream and spawn the dispatcher task
    pub fn start(&self) -> Result<JoinHandle<()>, TransportError> {
        let replies = self.transport.replies()?;
        info!(
            min_replies = self.config.min_replies,
            timeout_ms = self.config.timeout_ms,
            mailbox_capacity = self.config.mailbox_capacity,
            "Aggregator started"
        );
        Ok(tokio::spawn(self.dispatcher().run(replies)))
    }

    /// Run a request with a fresh correlation id and the configured limits
    pub async fn scatter_gather(&self) -> Result<AggregatedResponse, AggregatorError> {
        self.gather(new_correlation_id(), self.config.min_replies, self.config.timeout())
            .await
    }

    /// Run a request under an explicit correlation id, quorum and timeout
    pub async fn gather(
        &self,
        correlation_id: String,
        min_replies: usize,
        timeout: Duration,
    ) -> Result<AggregatedResponse, AggregatorError> {
        debug!(%correlation_id, min_replies, ?timeout, state = ?RequestState::New, "Aggregator::gather: called");
        Counters::bump(&self.counters.requests_total);

        let issued_at = Utc::now();
        let deadline = Instant::now() + timeout;

        // Register before publishing so a fast reply always finds its mailbox
        let mut mailbox = match self.registry.register(&correlation_id) {
            Ok(mailbox) => mailbox,
            Err(e) => {
                error!(%correlation_id, "Duplicate correlation id, aborting request");
                Counters::bump(&self.counters.duplicate_keys);
                return Err(e.into());
            }
        };
        let _registration = Registration {
            registry: &self.registry,
            correlation_id: &correlation_id,
        };

        let message = RequestMessage::new(correlation_id.clone(), issued_at);
        if let Err(e) = self.transport.publish(&message).await {
            warn!(%correlation_id, error = %e, "Failed to publish request");
            Counters::bump(&self.counters.publish_failures);
            return Err(e.into());
        }
        debug!(%correlation_id, state = ?RequestState::Published, "Published request");

        debug!(%correlation_id, state = ?RequestState::Collecting, "Waiting for replies");
        let collected = collect_until(&mut mailbox, min_replies, deadline).await;

        let state = if collected.timed_out {
            Counters::bump(&self.counters.timed_out);
            RequestState::TimedOut
        } else {
            Counters::bump(&self.counters.quorum_met);
            RequestState::QuorumMet
        };
        info!(
            %correlation_id,
            count = collected.replies.len(),
            timeout = collected.timed_out,
            ?state,
            "Request completed"
        );

        Ok(AggregatedResponse::new(
            correlation_id.clone(),
            collected.replies,
            collected.timed_out,
        ))
    }

    /// Current counters plus the number of in-flight requests
    pub fn metrics(&self) -> AggregatorMetrics {
        self.counters.snapshot(self.registry.len())
    }
}
