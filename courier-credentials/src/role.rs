//! Cross-account role assumption layered on top of a base credential

use std::{fmt::Debug, sync::Arc, time::SystemTime};

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sts::error::DisplayErrorContext;
use courier_common::internal;
use tokio::sync::watch;

use crate::{Credential, CredentialError, CredentialSource, Provenance};

const PROVIDER_NAME: &str = "courier";

/// Result of the read-only identity query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

/// Exchanges a credential plus a role identifier for a temporary scoped
/// credential.
#[async_trait]
pub trait RoleAssumer: Send + Sync + Debug {
    async fn assume(
        &self,
        base: &Credential,
        role_arn: &str,
        session_name: &str,
    ) -> Result<Credential, CredentialError>;

    /// Identity of whoever `credential` belongs to
    async fn caller_identity(&self, credential: &Credential)
    -> Result<CallerIdentity, CredentialError>;
}

/// [`RoleAssumer`] backed by AWS STS
#[derive(Debug, Clone)]
pub struct StsRoleAssumer {
    config: SdkConfig,
}

impl StsRoleAssumer {
    pub const fn new(config: SdkConfig) -> Self {
        Self { config }
    }

    fn client(&self, credential: &Credential) -> aws_sdk_sts::Client {
        let credentials = aws_credential_types::Credentials::new(
            credential.access_key(),
            credential.secret_key(),
            credential.session_token().map(str::to_string),
            None,
            PROVIDER_NAME,
        );

        let config = aws_sdk_sts::config::Builder::from(&self.config)
            .credentials_provider(credentials)
            .build();

        aws_sdk_sts::Client::from_conf(config)
    }
}

#[async_trait]
impl RoleAssumer for StsRoleAssumer {
    #[tracing::instrument(level = "debug", skip(self, base))]
    async fn assume(
        &self,
        base: &Credential,
        role_arn: &str,
        session_name: &str,
    ) -> Result<Credential, CredentialError> {
        let failed = |reason: String| CredentialError::RoleAssumption {
            role: role_arn.to_string(),
            reason,
        };

        let output = self
            .client(base)
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(|e| failed(DisplayErrorContext(e).to_string()))?;

        let credentials = output
            .credentials()
            .ok_or_else(|| failed("response carried no credentials".to_string()))?;

        let credential = Credential::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            Some(credentials.session_token().to_string()),
            Provenance::Assumed,
        );

        Ok(match SystemTime::try_from(*credentials.expiration()) {
            Ok(expiry) => credential.expiring_at(expiry),
            Err(_) => credential,
        })
    }

    async fn caller_identity(
        &self,
        credential: &Credential,
    ) -> Result<CallerIdentity, CredentialError> {
        let output = self
            .client(credential)
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| CredentialError::Provider(DisplayErrorContext(e).to_string()))?;

        Ok(CallerIdentity {
            account: output.account().unwrap_or_default().to_string(),
            arn: output.arn().unwrap_or_default().to_string(),
        })
    }
}

/// Configuration of the optional role-assumption layer
#[derive(Debug, Clone)]
pub struct RoleLayer {
    pub assumer: Arc<dyn RoleAssumer>,
    pub role_arn: String,
    pub session_name: String,
}

/// A credential source that always assumes the role with the latest base
/// credential, so it keeps working across base renewals.
#[derive(Debug)]
pub(crate) struct AssumedRoleSource {
    layer: RoleLayer,
    base: watch::Receiver<Credential>,
}

impl AssumedRoleSource {
    pub(crate) const fn new(layer: RoleLayer, base: watch::Receiver<Credential>) -> Self {
        Self { layer, base }
    }

    /// Log who we are now. Failure here is only worth a warning.
    pub(crate) async fn log_identity(&self, credential: &Credential) {
        match self.layer.assumer.caller_identity(credential).await {
            Ok(identity) => internal!(
                level = INFO,
                "Current identity - Account: {}, ARN: {}",
                identity.account,
                identity.arn
            ),
            Err(err) => internal!(
                level = WARN,
                "Could not verify assumed identity: {err}"
            ),
        }
    }
}

#[async_trait]
impl CredentialSource for AssumedRoleSource {
    fn name(&self) -> &'static str {
        "role"
    }

    async fn fetch(&self) -> Result<Credential, CredentialError> {
        let base = self.base.borrow().clone();

        internal!(
            level = INFO,
            "Assuming cross-account role: {}",
            self.layer.role_arn
        );

        let credential = self
            .layer
            .assumer
            .assume(&base, &self.layer.role_arn, &self.layer.session_name)
            .await?;

        internal!(
            level = INFO,
            "Successfully assumed cross-account role {} as {}",
            self.layer.role_arn,
            credential.access_key()
        );

        Ok(credential)
    }
}
