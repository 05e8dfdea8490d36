//! Probe endpoints
//!
//! - `GET /health`: fixed `{name, status, version}` JSON payload
//! - `GET /health/live`: 200 while the process can answer at all
//! - `GET /health/ready`: 200 once SMTP is bound and credentials are valid,
//!   503 with the individual flags otherwise

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use courier_common::Signal;
use tokio::{net::TcpListener, sync::broadcast};
use tower_http::timeout::TimeoutLayer;

use crate::{HealthChecker, HealthConfig, HealthError};

const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct HealthServer {
    listener: TcpListener,
    router: Router,
}

impl HealthServer {
    /// Bind the probe endpoints
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::Bind`] if the configured address is unavailable.
    pub async fn new(
        config: &HealthConfig,
        checker: Arc<HealthChecker>,
    ) -> Result<Self, HealthError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|source| HealthError::Bind {
                address: config.listen_address.clone(),
                source,
            })?;

        tracing::info!(address = %config.listen_address, "Health endpoint listening");

        Ok(Self {
            listener,
            router: router(checker),
        })
    }

    /// Answer probes until `shutdown` fires
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::Serve`] if the server stops on an I/O error.
    pub async fn serve(self, mut shutdown: broadcast::Receiver<Signal>) -> Result<(), HealthError> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::debug!("Health endpoint shutting down");
            })
            .await
            .map_err(HealthError::Serve)
    }
}

fn router(checker: Arc<HealthChecker>) -> Router {
    Router::new()
        .route("/health", get(status))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .with_state(checker)
        .layer(TimeoutLayer::new(PROBE_TIMEOUT))
}

async fn status(State(checker): State<Arc<HealthChecker>>) -> Response {
    Json(checker.status()).into_response()
}

async fn live(State(checker): State<Arc<HealthChecker>>) -> Response {
    if checker.is_alive() {
        (StatusCode::OK, "OK").into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

async fn ready(State(checker): State<Arc<HealthChecker>>) -> Response {
    if checker.is_ready() {
        return (StatusCode::OK, "OK").into_response();
    }

    let readiness = checker.readiness();
    tracing::debug!(
        smtp_ready = readiness.smtp_ready,
        credentials_ready = readiness.credentials_ready,
        "Not ready"
    );
    (StatusCode::SERVICE_UNAVAILABLE, Json(readiness)).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::header;

    use super::*;

    fn checker() -> Arc<HealthChecker> {
        Arc::new(HealthChecker::new("courier", "0.1.0"))
    }

    #[tokio::test]
    async fn status_is_json() {
        let response = status(State(checker())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn liveness_probe_always_passes() {
        let response = live(State(checker())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_probe_fails_when_not_ready() {
        let response = ready(State(checker())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn readiness_probe_passes_when_all_ready() {
        let checker = checker();
        checker.set_smtp_ready(true);
        checker.set_credentials_ready(true);

        let response = ready(State(checker)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn serves_fixed_payload_over_http() {
        let config = HealthConfig {
            enabled: true,
            listen_address: "127.0.0.1:0".to_string(),
        };
        let server = HealthServer::new(&config, checker()).await.unwrap();
        let addr = server.listener.local_addr().unwrap();

        let (tx, rx) = tokio::sync::broadcast::channel(1);
        let handle = tokio::spawn(server.serve(rx));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(
            &mut stream,
            b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await
        .unwrap();

        let mut body = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut body)
            .await
            .unwrap();

        assert!(body.starts_with("HTTP/1.1 200"));
        assert!(body.contains(r#"{"name":"courier","status":"ok","version":"0.1.0"}"#));

        tx.send(Signal::Shutdown).unwrap();
        handle.await.unwrap().unwrap();
    }
}
