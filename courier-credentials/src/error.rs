use courier_common::error::ConfigError;
use thiserror::Error;

/// Failures of the credential supply chain
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Flags request a source that is disabled or incompletely specified
    #[error("Invalid credential configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// The initial credential could not be acquired
    #[error("Unable to acquire credential from {source_name}")]
    Fetch {
        source_name: &'static str,
        #[source]
        cause: Box<Self>,
    },

    /// Renewal can no longer keep the credential valid
    #[error("Renewal of {layer} credential exhausted after {attempts} attempt(s)")]
    Renewal {
        layer: &'static str,
        attempts: u32,
        #[source]
        cause: Box<Self>,
    },

    #[error("Unable to assume role {role}: {reason}")]
    RoleAssumption { role: String, reason: String },

    /// The ambient provider chain failed
    #[error("Credential provider error: {0}")]
    Provider(String),

    /// The secret store could not be reached
    #[error("Secret store request failed: {0}")]
    SecretStore(String),

    /// The secret store answered with an error status
    #[error("Secret store returned {status}: {message}")]
    SecretStoreStatus { status: u16, message: String },

    #[error("Malformed secret: {0}")]
    MalformedSecret(String),
}

impl From<reqwest::Error> for CredentialError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedSecret(err.to_string())
        } else {
            Self::SecretStore(err.to_string())
        }
    }
}
