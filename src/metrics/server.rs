//! HTTP server for the Prometheus metrics endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use thiserror::Error;
use tower_http::cors::CorsLayer;

use super::{MetricsRegistry, MetricsSnapshot};
use crate::pipeline::Pipeline;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Creates a config with a custom port.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

struct MetricsState {
    registry: MetricsRegistry,
    pipeline: Arc<Pipeline>,
}

impl MetricsState {
    /// Refreshes the registry from the pipeline and encodes it.
    fn scrape(&self) -> Result<String, super::MetricsError> {
        let snapshot = MetricsSnapshot::from_components(&self.pipeline.stats(), &self.pipeline.pool().stats());
        self.registry.update(&snapshot);
        self.registry.encode()
    }
}

/// HTTP server exposing pipeline metrics.
///
/// Every scrape reads the pipeline counters, so the server needs no
/// separate update loop.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: Arc<MetricsState>,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry, pipeline: Arc<Pipeline>) -> Self {
        Self {
            config,
            state: Arc::new(MetricsState { registry, pipeline }),
        }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Starts the HTTP server.
    ///
    /// This method runs the server until it is shut down.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(addr = %self.config.bind_addr, "Metrics server listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        Ok(())
    }
}

/// Handler for the /metrics endpoint.
async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    match state.scrape() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

/// Handler for the /health endpoint; unavailable while stopped.
async fn health_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    if state.pipeline.is_started() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "STOPPED")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Context;

    #[test]
    fn test_config_default() {
        let config = MetricsServerConfig::default();
        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_config_with_port() {
        let config = MetricsServerConfig::with_port(8080);
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn test_scrape_reads_pipeline() {
        let pipeline = Arc::new(Pipeline::new(Arc::new(Context::new())));
        let server = MetricsServer::new(MetricsServerConfig::default(), MetricsRegistry::new().unwrap(), pipeline);
        let output = server.state.scrape().unwrap();
        assert!(output.contains("depthstream_started 0"));
        let _ = server.router();
    }
}
