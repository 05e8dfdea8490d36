use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    /// The probe address could not be bound
    #[error("Unable to bind health endpoint on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Health endpoint failed: {0}")]
    Serve(#[source] std::io::Error),
}
