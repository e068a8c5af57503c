//! Health check HTTP server

use crate::{HealthChecker, HealthConfig};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use herald_common::{DomainError, Signal};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

/// Health check HTTP server
///
/// Provides `/health/live` and `/health/ready` endpoints for orchestrator
/// probes.
#[derive(Debug)]
pub struct HealthServer {
    listener: TcpListener,
    router: Router,
}

impl HealthServer {
    /// Validate the configuration and bind the probe listener.
    ///
    /// # Errors
    /// `Validation` when the configuration is unusable; `Dependency` when
    /// binding the listen address fails.
    pub async fn new(
        config: HealthConfig,
        health_checker: Arc<HealthChecker>,
    ) -> Result<Self, DomainError> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| {
                DomainError::dependency(format!(
                    "failed to bind health server to {}",
                    config.listen_address
                ))
                .with_field("listen_address", &config.listen_address)
                .with_source(e)
            })?;

        tracing::info!(
            address = %config.listen_address,
            "Health check server bound successfully"
        );

        // Probes must answer within 1 second
        let router = Router::new()
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .with_state(health_checker)
            .layer(TimeoutLayer::new(Duration::from_secs(1)));

        Ok(Self { listener, router })
    }

    /// Run the health server until shutdown signal is received
    ///
    /// # Errors
    /// `Internal` when the server loop fails.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), DomainError> {
        tracing::info!("Health check server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Health check server received shutdown signal");
            })
            .await
            .map_err(|e| DomainError::internal("health server failed").with_source(e))?;

        tracing::info!("Health check server stopped");
        Ok(())
    }
}

/// Liveness probe handler
///
/// Returns 200 OK if the application is alive (can respond to requests).
async fn liveness_handler(State(health_checker): State<Arc<HealthChecker>>) -> Response {
    if health_checker.is_alive() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
    }
}

/// Readiness probe handler
///
/// Returns 200 OK if the application is ready to accept traffic.
async fn readiness_handler(State(health_checker): State<Arc<HealthChecker>>) -> Response {
    if health_checker.is_ready() {
        (StatusCode::OK, "OK").into_response()
    } else {
        let status = health_checker.get_status();
        tracing::warn!(
            subscribers_ready = status.subscribers_ready,
            status_store_ready = status.status_store_ready,
            email_ready = status.email_ready,
            sms_ready = status.sms_ready,
            queue_size = status.queue_size,
            max_queue_size = status.max_queue_size,
            "Readiness probe failed"
        );
        (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response()
    }
}
