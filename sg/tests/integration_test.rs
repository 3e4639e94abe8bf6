//! Integration tests for Scatter
//!
//! These drive the full stack: in-process broker, workers, dispatcher and
//! aggregator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use scatter::aggregator::{Aggregator, AggregatorConfig, AggregatorError, ServiceResponse};
use scatter::config::{BrokerConfig, WorkerConfig};
use scatter::transport::{MemoryBroker, TransportError};
use scatter::worker::spawn_workers;
use tokio::task::JoinHandle;

struct Harness {
    broker: Arc<MemoryBroker>,
    aggregator: Arc<Aggregator>,
    tasks: Vec<JoinHandle<()>>,
}

impl Harness {
    fn start(config: AggregatorConfig, workers: &[WorkerConfig]) -> Self {
        let broker = Arc::new(MemoryBroker::new(&BrokerConfig::default()));
        let mut tasks = spawn_workers(&broker, workers);
        let aggregator = Arc::new(Aggregator::new(config, broker.clone()));
        tasks.push(aggregator.start().expect("Failed to start dispatcher"));
        Self {
            broker,
            aggregator,
            tasks,
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn config(min_replies: usize, timeout_ms: u64) -> AggregatorConfig {
    AggregatorConfig {
        min_replies,
        timeout_ms,
        mailbox_capacity: 10,
    }
}

// =============================================================================
// Quorum / timeout scenarios
// =============================================================================

#[tokio::test]
async fn test_two_workers_meet_quorum_quickly() {
    let harness = Harness::start(
        config(2, 10_000),
        &[WorkerConfig::new("service_a", 50), WorkerConfig::new("service_b", 150)],
    );

    let start = Instant::now();
    let resp = harness.aggregator.scatter_gather().await.unwrap();

    assert!(!resp.timeout);
    assert_eq!(resp.count, 2);
    assert_eq!(resp.responses.len(), 2);
    assert!(start.elapsed() < Duration::from_secs(1));

    // Arrival order follows the worker delays
    assert_eq!(resp.responses[0].service_id, "service_a");
    assert_eq!(resp.responses[1].service_id, "service_b");
    for reply in &resp.responses {
        assert_eq!(reply.correlation_id, resp.request_id);
    }
}

#[tokio::test]
async fn test_single_worker_times_out_with_partial_result() {
    let harness = Harness::start(config(2, 1_000), &[WorkerConfig::new("service_a", 20)]);

    let start = Instant::now();
    let resp = harness.aggregator.scatter_gather().await.unwrap();
    let elapsed = start.elapsed();

    assert!(resp.timeout);
    assert_eq!(resp.count, 1);
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(2));
}

#[tokio::test]
async fn test_no_workers_times_out_empty() {
    let harness = Harness::start(config(1, 100), &[]);

    let resp = harness.aggregator.scatter_gather().await.unwrap();
    assert!(resp.timeout);
    assert_eq!(resp.count, 0);
}

#[tokio::test]
async fn test_disabled_worker_forces_timeout() {
    let mut disabled = WorkerConfig::new("service_b", 10);
    disabled.enabled = false;
    let harness = Harness::start(config(2, 200), &[WorkerConfig::new("service_a", 10), disabled]);

    let resp = harness.aggregator.scatter_gather().await.unwrap();
    assert!(resp.timeout);
    assert_eq!(resp.count, 1);
}

#[tokio::test]
async fn test_zero_quorum_does_not_wait() {
    let harness = Harness::start(config(0, 10_000), &[WorkerConfig::new("service_a", 500)]);

    let start = Instant::now();
    let resp = harness.aggregator.scatter_gather().await.unwrap();

    assert!(!resp.timeout);
    assert_eq!(resp.count, 0);
    assert!(start.elapsed() < Duration::from_millis(500));
}

// =============================================================================
// Isolation and cleanup
// =============================================================================

#[tokio::test]
async fn test_concurrent_requests_are_isolated() {
    let harness = Harness::start(
        config(2, 5_000),
        &[WorkerConfig::new("service_a", 10), WorkerConfig::new("service_b", 30)],
    );

    let mut requests = Vec::new();
    for _ in 0..25 {
        let aggregator = harness.aggregator.clone();
        requests.push(tokio::spawn(async move { aggregator.scatter_gather().await }));
    }

    for request in requests {
        let resp = request.await.unwrap().unwrap();
        assert!(!resp.timeout);
        assert_eq!(resp.count, 2);
        assert!(resp.responses.iter().all(|r| r.correlation_id == resp.request_id));
    }

    assert!(harness.aggregator.registry().is_empty());
    assert_eq!(harness.aggregator.metrics().quorum_met, 25);
}

#[tokio::test]
async fn test_late_replies_are_dropped_after_quorum() {
    let harness = Harness::start(
        config(1, 5_000),
        &[WorkerConfig::new("fast", 10), WorkerConfig::new("slow", 200)],
    );

    let resp = harness.aggregator.scatter_gather().await.unwrap();
    assert!(!resp.timeout);
    assert_eq!(resp.count, 1);
    assert_eq!(resp.responses[0].service_id, "fast");
    assert!(!harness.aggregator.registry().contains(&resp.request_id));

    // Let the slow worker answer into the void
    tokio::time::sleep(Duration::from_millis(400)).await;

    let metrics = harness.aggregator.metrics();
    assert_eq!(metrics.in_flight, 0);
    assert_eq!(metrics.replies_delivered, 1);
    assert_eq!(metrics.replies_unmatched, 1);
}

#[tokio::test]
async fn test_reply_for_completed_request_does_not_disturb_others() {
    let harness = Harness::start(config(1, 2_000), &[WorkerConfig::new("service_a", 100)]);

    let first = harness.aggregator.scatter_gather().await.unwrap();

    // Replay a reply for the finished request while a new one is in flight
    let aggregator = harness.aggregator.clone();
    let second = tokio::spawn(async move { aggregator.scatter_gather().await });

    let stale = ServiceResponse {
        service_id: "ghost".to_string(),
        correlation_id: first.request_id.clone(),
        data: serde_json::json!({"stale": true}),
        timestamp: Utc::now(),
    };
    harness
        .broker
        .results_publisher()
        .publish(serde_json::to_vec(&stale).unwrap())
        .await
        .unwrap();

    let second = second.await.unwrap().unwrap();
    assert!(!second.timeout);
    assert_eq!(second.count, 1);
    assert_eq!(second.responses[0].service_id, "service_a");
    assert_ne!(second.request_id, first.request_id);
}

#[tokio::test]
async fn test_malformed_reply_does_not_stop_dispatcher() {
    let harness = Harness::start(config(1, 2_000), &[WorkerConfig::new("service_a", 50)]);

    harness
        .broker
        .results_publisher()
        .publish(b"definitely not json".to_vec())
        .await
        .unwrap();

    let resp = harness.aggregator.scatter_gather().await.unwrap();
    assert!(!resp.timeout);
    assert_eq!(resp.count, 1);
    assert_eq!(harness.aggregator.metrics().replies_malformed, 1);
}

// =============================================================================
// Transport failures
// =============================================================================

#[tokio::test]
async fn test_publish_failure_surfaces_and_cleans_up() {
    let harness = Harness::start(config(1, 1_000), &[WorkerConfig::new("service_a", 10)]);
    harness.broker.close();

    let err = harness.aggregator.scatter_gather().await.unwrap_err();
    assert!(matches!(err, AggregatorError::Transport(TransportError::Closed)));
    assert!(harness.aggregator.registry().is_empty());
}

#[tokio::test]
async fn test_reply_stream_cannot_be_taken_twice() {
    let harness = Harness::start(config(1, 1_000), &[]);
    let err = harness.aggregator.start().unwrap_err();
    assert!(matches!(err, TransportError::AlreadyConsumed));
}
