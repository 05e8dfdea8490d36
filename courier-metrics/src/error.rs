//! Error types for metrics operations

use thiserror::Error;

/// Errors that can occur during metrics operations
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A collector could not be created or registered
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// Failed to bind the exposition server
    #[error("Failed to bind metrics server to {address}: {source}")]
    BindError {
        address: String,
        source: std::io::Error,
    },

    /// Exposition server encountered a runtime error
    #[error("Metrics server error: {0}")]
    ServerError(String),

    /// Gathered metrics were not valid text
    #[error("Prometheus export error: {0}")]
    Export(String),
}
