//! In-process broker: a fan-out exchange plus a shared results queue
//!
//! The exchange is a tokio broadcast channel, so every bound queue sees every
//! request. Workers push replies into a bounded mpsc results queue that the
//! aggregator consumes as its reply stream.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use super::error::TransportError;
use super::{RawReply, ReplyStream, Transport};
use crate::aggregator::RequestMessage;
use crate::config::BrokerConfig;

pub struct MemoryBroker {
    exchange: String,
    results_queue: String,
    fanout: broadcast::Sender<Vec<u8>>,
    results_tx: mpsc::Sender<RawReply>,
    results_rx: Mutex<Option<mpsc::Receiver<RawReply>>>,
    closed: AtomicBool,
}

impl MemoryBroker {
    pub fn new(config: &BrokerConfig) -> Self {
        info!(
            exchange = %config.exchange,
            results_queue = %config.results_queue,
            "Declaring in-process exchange and results queue"
        );
        let (fanout, _) = broadcast::channel(config.request_buffer.max(1));
        let (results_tx, results_rx) = mpsc::channel(config.reply_buffer.max(1));
        Self {
            exchange: config.exchange.clone(),
            results_queue: config.results_queue.clone(),
            fanout,
            results_tx,
            results_rx: Mutex::new(Some(results_rx)),
            closed: AtomicBool::new(false),
        }
    }

    /// Bind a new queue to the exchange
    ///
    /// The queue only sees requests published after binding.
    pub fn bind_queue(&self) -> broadcast::Receiver<Vec<u8>> {
        debug!(exchange = %self.exchange, "MemoryBroker::bind_queue: called");
        self.fanout.subscribe()
    }

    /// Number of queues currently bound to the exchange
    pub fn bound_queues(&self) -> usize {
        self.fanout.receiver_count()
    }

    /// Handle for a worker to push replies into the results queue
    pub fn results_publisher(&self) -> ResultsPublisher {
        ResultsPublisher {
            queue: self.results_queue.clone(),
            tx: self.results_tx.clone(),
        }
    }

    /// Refuse further publishes
    pub fn close(&self) {
        info!(exchange = %self.exchange, "Closing broker");
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryBroker {
    async fn publish(&self, message: &RequestMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let body = serde_json::to_vec(message)?;
        match self.fanout.send(body) {
            Ok(queues) => {
                debug!(correlation_id = %message.correlation_id, queues, "Published request");
            }
            Err(_) => {
                // Fan-out exchange with nothing bound: the message is discarded
                debug!(correlation_id = %message.correlation_id, "No bound queues, request discarded");
            }
        }
        Ok(())
    }

    fn replies(&self) -> Result<ReplyStream, TransportError> {
        let rx = self.results_rx.lock().take().ok_or(TransportError::AlreadyConsumed)?;
        debug!(results_queue = %self.results_queue, "MemoryBroker::replies: consumer attached");
        Ok(ReceiverStream::new(rx).boxed())
    }
}

/// Sender side of the results queue, one per worker
#[derive(Debug, Clone)]
pub struct ResultsPublisher {
    queue: String,
    tx: mpsc::Sender<RawReply>,
}

impl ResultsPublisher {
    /// Enqueue a JSON reply body, waiting if the queue is full
    pub async fn publish(&self, body: Vec<u8>) -> Result<(), TransportError> {
        self.tx
            .send(RawReply::json(body))
            .await
            .map_err(|_| TransportError::ResultsQueueClosed(self.queue.clone()))
    }
}
