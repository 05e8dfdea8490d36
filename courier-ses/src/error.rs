use thiserror::Error;

/// Why a single backend call failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The service refused the message
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },

    #[error("Throttled: {0}")]
    Throttled(String),

    /// The request never got a service response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request could not be constructed
    #[error("Unable to build request: {0}")]
    Build(String),
}

impl BackendError {
    /// The relay cannot reliably tell a permanent rejection from a transient
    /// one, so every backend failure is reported as temporary.
    pub const fn is_temporary(&self) -> bool {
        true
    }

    /// Label for the typed failure counter
    pub const fn metric_label(&self) -> &'static str {
        "ses error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_is_temporary() {
        for err in [
            BackendError::Rejected {
                code: "MessageRejected".to_string(),
                message: "Email address is not verified".to_string(),
            },
            BackendError::Throttled("Maximum sending rate exceeded".to_string()),
            BackendError::Transport("dispatch failure".to_string()),
            BackendError::Build("data was not specified".to_string()),
        ] {
            assert!(err.is_temporary());
            assert_eq!(err.metric_label(), "ses error");
        }
    }
}
