//! Dynamic AWS credentials issued by a Vault secrets engine

use std::time::Duration;

use async_trait::async_trait;
use courier_common::internal;
use reqwest::{
    StatusCode,
    header::{HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize};

use super::CredentialSource;
use crate::{Credential, CredentialError, Lease, Provenance, VaultConfig};

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Minimal Vault HTTP API client: read a secret, renew a lease
#[derive(Debug, Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    address: String,
}

#[derive(Debug, Deserialize)]
struct SecretResponse {
    #[serde(default)]
    lease_id: String,
    #[serde(default)]
    lease_duration: u64,
    #[serde(default)]
    renewable: bool,
    data: Option<AwsSecretData>,
}

#[derive(Debug, Deserialize)]
struct AwsSecretData {
    access_key: String,
    secret_key: String,
    #[serde(default)]
    security_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RenewRequest<'a> {
    lease_id: &'a str,
    increment: u64,
}

impl VaultClient {
    /// Build a client for the configured server
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the address or token is missing or
    /// the token is not a valid header value.
    pub fn new(config: &VaultConfig) -> Result<Self, CredentialError> {
        let token = config
            .token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or(courier_common::error::ConfigError::MissingField(
                "credentials.vault.token",
            ))?;

        let mut token = HeaderValue::from_str(token).map_err(|_| {
            courier_common::error::ConfigError::Invalid {
                field: "credentials.vault.token",
                reason: "not a valid header value".to_string(),
            }
        })?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, token);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            address: config.address.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CredentialError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .ok()
            .filter(|body| !body.errors.is_empty())
            .map_or_else(
                || {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown")
                        .to_string()
                },
                |body| body.errors.join("; "),
            );

        Err(CredentialError::SecretStoreStatus {
            status: status.as_u16(),
            message,
        })
    }

    /// Read the secret at `path` and turn it into a credential
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, Vault answers with an error
    /// status, or the response does not carry AWS credentials.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn read(&self, path: &str) -> Result<Credential, CredentialError> {
        let response = self.http.get(self.url(path)).send().await?;
        let secret: SecretResponse = Self::check(response).await?.json().await?;

        let data = secret.data.ok_or_else(|| {
            CredentialError::MalformedSecret(format!("secret at {path} has no data"))
        })?;

        let credential = Credential::new(
            data.access_key,
            data.secret_key,
            data.security_token.filter(|token| !token.is_empty()),
            Provenance::Dynamic,
        );

        if secret.lease_duration == 0 {
            return Ok(credential);
        }

        Ok(credential.with_lease(Lease {
            id: secret.lease_id,
            duration: Duration::from_secs(secret.lease_duration),
            renewable: secret.renewable,
        }))
    }

    /// Ask Vault to extend a lease by `increment`, returning the granted
    /// lease.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Vault refuses the renewal.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn renew(&self, lease_id: &str, increment: Duration) -> Result<Lease, CredentialError> {
        let response = self
            .http
            .put(self.url("sys/leases/renew"))
            .json(&RenewRequest {
                lease_id,
                increment: increment.as_secs(),
            })
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Err(CredentialError::MalformedSecret(
                "lease renewal returned no body".to_string(),
            ));
        }

        let renewed: SecretResponse = Self::check(response).await?.json().await?;

        Ok(Lease {
            id: if renewed.lease_id.is_empty() {
                lease_id.to_string()
            } else {
                renewed.lease_id
            },
            duration: Duration::from_secs(renewed.lease_duration),
            renewable: renewed.renewable,
        })
    }
}

/// Credentials read from a Vault path such as `aws/creds/my-mail-user`
///
/// Renewal extends the lease in place while Vault keeps granting the full
/// requested increment. Once the lease is not renewable, or Vault caps the
/// increment because the lease is reaching its maximum TTL, the secret is
/// read again to obtain a new credential.
#[derive(Debug, Clone)]
pub struct VaultSource {
    client: VaultClient,
    path: String,
}

impl VaultSource {
    pub fn new(client: VaultClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for VaultSource {
    fn name(&self) -> &'static str {
        "vault"
    }

    async fn fetch(&self) -> Result<Credential, CredentialError> {
        let credential = self.client.read(&self.path).await?;

        internal!(
            level = INFO,
            "Read credential {} from vault path {} (lease {:?})",
            credential.access_key(),
            self.path,
            credential.lease().map(|lease| lease.duration)
        );

        Ok(credential)
    }

    async fn renew(&self, current: &Credential) -> Result<Credential, CredentialError> {
        let Some(lease) = current
            .lease()
            .filter(|lease| lease.renewable && !lease.id.is_empty())
        else {
            internal!(
                level = DEBUG,
                "Lease for {} is not renewable, reading a new secret",
                self.path
            );
            return self.fetch().await;
        };

        let granted = self.client.renew(&lease.id, lease.duration).await?;

        if granted.duration < lease.duration {
            internal!(
                level = INFO,
                "Lease {} capped at {:?} (requested {:?}), reading a new secret",
                lease.id,
                granted.duration,
                lease.duration
            );
            return self.fetch().await;
        }

        internal!(
            level = DEBUG,
            "Lease {} renewed for {:?}",
            granted.id,
            granted.duration
        );

        Ok(current.clone().with_lease(granted))
    }
}
