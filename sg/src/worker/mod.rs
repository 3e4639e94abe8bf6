//! Simulated workers bound to the in-process broker
//!
//! Each worker gets its own queue on the fan-out exchange, answers every
//! request after a fixed delay, and publishes its reply to the results queue.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::aggregator::{RequestMessage, ServiceResponse};
use crate::config::WorkerConfig;
use crate::transport::{MemoryBroker, ResultsPublisher};

/// Payload a worker puts in the `data` field of its reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPayload {
    pub message: String,
    pub service_id: String,
    pub random: u32,
}

#[derive(Debug, Clone)]
pub struct Worker {
    id: String,
    delay: Duration,
}

impl Worker {
    pub fn new(id: impl Into<String>, delay: Duration) -> Self {
        Self { id: id.into(), delay }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.id.clone(), Duration::from_millis(config.delay_ms))
    }

    /// Build the encoded reply for an encoded request
    pub fn reply_to(&self, request: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
        let request: RequestMessage = serde_json::from_slice(request)?;
        let payload = WorkerPayload {
            message: format!("Response from {}", self.id),
            service_id: self.id.clone(),
            random: rand::random_range(0..1000),
        };
        let reply = ServiceResponse {
            service_id: self.id.clone(),
            correlation_id: request.correlation_id,
            data: serde_json::to_value(payload)?,
            timestamp: Utc::now(),
        };
        serde_json::to_vec(&reply)
    }

    /// Serve requests from `queue` until the exchange goes away
    ///
    /// Each reply is produced on its own task so a slow reply never delays
    /// the next request.
    pub async fn run(self, mut queue: broadcast::Receiver<Vec<u8>>, results: ResultsPublisher) {
        info!(worker = %self.id, delay = ?self.delay, "Worker started consuming");

        loop {
            let request = match queue.recv().await {
                Ok(request) => request,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(worker = %self.id, skipped, "Worker fell behind, requests skipped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let body = match self.reply_to(&request) {
                Ok(body) => body,
                Err(e) => {
                    warn!(worker = %self.id, error = %e, "Skipping malformed request");
                    continue;
                }
            };

            let worker = self.id.clone();
            let delay = self.delay;
            let results = results.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                match results.publish(body).await {
                    Ok(()) => debug!(%worker, "Published reply"),
                    Err(e) => warn!(%worker, error = %e, "Failed to publish reply"),
                }
            });
        }

        info!(worker = %self.id, "Worker stopped");
    }
}

/// Bind and start every enabled worker
pub fn spawn_workers(broker: &MemoryBroker, workers: &[WorkerConfig]) -> Vec<JoinHandle<()>> {
    workers
        .iter()
        .filter(|w| {
            if !w.enabled {
                info!(worker = %w.id, "Worker disabled, not starting");
            }
            w.enabled
        })
        .map(|w| {
            let worker = Worker::from_config(w);
            let queue = broker.bind_queue();
            tokio::spawn(worker.run(queue, broker.results_publisher()))
        })
        .collect()
}
