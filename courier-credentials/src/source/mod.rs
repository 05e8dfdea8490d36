//! Base credential sources

pub mod vault;

use std::fmt::Debug;

use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use courier_common::internal;

use crate::{Credential, CredentialError, Provenance};

/// One layer of the supply chain: something that can produce a credential
/// and later produce its replacement.
#[async_trait]
pub trait CredentialSource: Send + Sync + Debug {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Acquire a fresh credential
    async fn fetch(&self) -> Result<Credential, CredentialError>;

    /// Produce the replacement for `current`. Sources without a cheaper
    /// renewal path simply fetch again.
    async fn renew(&self, current: &Credential) -> Result<Credential, CredentialError> {
        let _ = current;
        self.fetch().await
    }
}

/// The AWS default provider chain: environment, shared profile, web
/// identity, container and instance metadata.
#[derive(Debug, Clone)]
pub struct AmbientSource {
    provider: SharedCredentialsProvider,
}

impl AmbientSource {
    pub const fn new(provider: SharedCredentialsProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CredentialSource for AmbientSource {
    fn name(&self) -> &'static str {
        "ambient"
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn fetch(&self) -> Result<Credential, CredentialError> {
        let credentials = self
            .provider
            .provide_credentials()
            .await
            .map_err(|e| CredentialError::Provider(e.to_string()))?;

        let credential = Credential::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            credentials.session_token().map(str::to_string),
            Provenance::Ambient,
        );

        internal!(
            level = DEBUG,
            "Resolved ambient credential {}",
            credential.access_key()
        );

        Ok(match credentials.expiry() {
            Some(expiry) => credential.expiring_at(expiry),
            None => credential,
        })
    }
}
