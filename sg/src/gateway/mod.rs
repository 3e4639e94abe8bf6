//! HTTP gateway in front of the aggregator
//!
//! - `GET /`        liveness text
//! - `GET /data`    one scatter-gather round, aggregated as JSON
//! - `GET /metrics` aggregator counters
//!
//! Other methods on these routes get 405 from the router.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use eyre::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::aggregator::{Aggregator, AggregatorMetrics};

/// Shared gateway state
#[derive(Clone)]
pub struct GatewayState {
    aggregator: Arc<Aggregator>,
    port: u16,
}

/// Build the gateway router
pub fn router(aggregator: Arc<Aggregator>, port: u16) -> Router {
    let state = GatewayState { aggregator, port };

    Router::new()
        .route("/", get(handle_home))
        .route("/data", get(handle_data))
        .route("/metrics", get(handle_metrics))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("Failed to read listener address")?;
    info!(%addr, "Gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Gateway server failed")?;

    info!("Gateway stopped");
    Ok(())
}

async fn handle_home(State(state): State<GatewayState>) -> String {
    format!("Gateway running on port {}", state.port)
}

async fn handle_data(State(state): State<GatewayState>) -> Response {
    match state.aggregator.scatter_gather().await {
        Ok(aggregated) => (StatusCode::OK, Json(aggregated)).into_response(),
        Err(e) => {
            error!(error = %e, "Scatter-gather request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

async fn handle_metrics(State(state): State<GatewayState>) -> Json<AggregatorMetrics> {
    Json(state.aggregator.metrics())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{AggregatedResponse, AggregatorConfig, RequestMessage};
    use crate::transport::{ReplyStream, Transport, TransportError};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use futures::StreamExt;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct SilentTransport {
        fail: bool,
    }

    #[async_trait]
    impl Transport for SilentTransport {
        async fn publish(&self, _message: &RequestMessage) -> Result<(), TransportError> {
            if self.fail { Err(TransportError::Closed) } else { Ok(()) }
        }

        fn replies(&self) -> Result<ReplyStream, TransportError> {
            Ok(futures::stream::pending().boxed())
        }
    }

    fn test_router(fail: bool) -> (Router, Arc<Aggregator>) {
        let config = AggregatorConfig {
            min_replies: 1,
            timeout_ms: 50,
            mailbox_capacity: 4,
        };
        let aggregator = Arc::new(Aggregator::new(config, Arc::new(SilentTransport { fail })));
        (router(aggregator.clone(), 4000), aggregator)
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_home() {
        let (app, _) = test_router(false);
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert_eq!(body, "Gateway running on port 4000");
    }

    #[tokio::test]
    async fn test_data_timeout_is_still_ok() {
        let (app, aggregator) = test_router(false);
        let response = app
            .oneshot(Request::builder().uri("/data").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let aggregated: AggregatedResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(aggregated.timeout);
        assert_eq!(aggregated.count, 0);
        assert!(aggregator.registry().is_empty());
    }

    #[tokio::test]
    async fn test_data_publish_failure_is_500() {
        let (app, aggregator) = test_router(true);
        let response = app
            .oneshot(Request::builder().uri("/data").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(aggregator.registry().is_empty());
        assert_eq!(aggregator.metrics().publish_failures, 1);
    }

    #[tokio::test]
    async fn test_data_rejects_non_get() {
        let (app, aggregator) = test_router(false);
        let response = app
            .oneshot(Request::builder().method("POST").uri("/data").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(aggregator.metrics().requests_total, 0);
    }

    #[tokio::test]
    async fn test_metrics() {
        let (app, _) = test_router(false);
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let metrics: AggregatorMetrics = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(metrics, AggregatorMetrics::default());
    }
}
