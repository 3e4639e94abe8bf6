//! Reply dispatcher - routes every reply on the results queue to its mailbox
//!
//! Runs as a single task for the process lifetime. A bad or unmatched reply
//! never stops the loop, and a full mailbox never blocks it.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use super::mailbox::Offer;
use super::messages::ServiceResponse;
use super::metrics::Counters;
use super::registry::CorrelationRegistry;
use crate::transport::{RawReply, ReplyStream};

/// What happened to a single reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// Matching mailbox was full; reply dropped
    MailboxFull,
    /// No in-flight request for the correlation id (unknown or late)
    Unmatched,
    /// Body could not be decoded
    Malformed,
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CorrelationRegistry>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CorrelationRegistry>, counters: Arc<Counters>) -> Self {
        Self { registry, counters }
    }

    /// Drain the reply stream until it ends
    pub async fn run(self, mut replies: ReplyStream) {
        info!("Dispatcher started");

        while let Some(raw) = replies.next().await {
            self.dispatch(raw);
        }

        info!("Reply stream closed, dispatcher stopped");
    }

    /// Decode and route one raw reply
    pub fn dispatch(&self, raw: RawReply) -> DispatchOutcome {
        Counters::bump(&self.counters.replies_received);
        debug!(received_at = %raw.received_at, bytes = raw.body.len(), "Dispatcher::dispatch: called");

        match ServiceResponse::decode(&raw) {
            Ok(reply) => self.route(reply),
            Err(e) => {
                warn!(error = %e, bytes = raw.body.len(), received_at = %raw.received_at, "Dropping undecodable reply");
                Counters::bump(&self.counters.replies_malformed);
                DispatchOutcome::Malformed
            }
        }
    }

    /// Route an already decoded reply
    pub fn route(&self, reply: ServiceResponse) -> DispatchOutcome {
        let correlation_id = reply.correlation_id.clone();
        let service_id = reply.service_id.clone();

        let Some(sender) = self.registry.lookup(&correlation_id) else {
            debug!(%correlation_id, %service_id, "No mailbox for reply, dropping");
            Counters::bump(&self.counters.replies_unmatched);
            return DispatchOutcome::Unmatched;
        };

        match sender.offer(reply) {
            Offer::Accepted => {
                debug!(%correlation_id, %service_id, "Reply delivered to mailbox");
                Counters::bump(&self.counters.replies_delivered);
                DispatchOutcome::Delivered
            }
            Offer::Full => {
                debug!(%correlation_id, %service_id, "Mailbox full, dropping reply");
                Counters::bump(&self.counters.replies_dropped_full);
                DispatchOutcome::MailboxFull
            }
            Offer::Closed => {
                // Request finished between lookup and push
                debug!(%correlation_id, %service_id, "Mailbox closed, dropping late reply");
                Counters::bump(&self.counters.replies_unmatched);
                DispatchOutcome::Unmatched
            }
        }
    }
}
