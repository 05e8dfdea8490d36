//! Metrics exposition HTTP server

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use courier_common::Signal;
use tokio::net::TcpListener;

use crate::{Metrics, MetricsConfig, MetricsError};

/// Serves `/metrics` in the Prometheus text format
pub struct MetricsServer {
    listener: TcpListener,
    router: Router,
}

impl MetricsServer {
    /// Bind the exposition server
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the configured address fails.
    pub async fn new(config: &MetricsConfig, metrics: Arc<Metrics>) -> Result<Self, MetricsError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| MetricsError::BindError {
                address: config.listen_address.clone(),
                source: e,
            })?;

        tracing::info!(
            address = %config.listen_address,
            "Metrics server bound successfully"
        );

        let router = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(metrics);

        Ok(Self { listener, router })
    }

    /// Run the server until a shutdown signal is received
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a runtime error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), MetricsError> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Metrics server received shutdown signal");
            })
            .await
            .map_err(|e| MetricsError::ServerError(e.to_string()))
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Unable to encode metrics: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
