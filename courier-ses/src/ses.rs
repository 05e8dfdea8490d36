//! Amazon SES `SendRawEmail` backend

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ses::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::send_raw_email::SendRawEmailError,
    primitives::Blob,
    types::RawMessage,
};
use courier_common::Envelope;
use courier_credentials::{ClientFactory, Credential};

use crate::{BackendError, MailBackend};

const PROVIDER_NAME: &str = "courier";

#[derive(Debug, Clone)]
pub struct SesBackend {
    client: aws_sdk_ses::Client,
}

impl SesBackend {
    pub const fn new(client: aws_sdk_ses::Client) -> Self {
        Self { client }
    }
}

fn classify(err: &SdkError<SendRawEmailError>) -> BackendError {
    match err.as_service_error() {
        Some(service) => {
            let code = service.code().unwrap_or("Unknown").to_string();
            let message = service.message().unwrap_or_default().to_string();

            if code == "Throttling" {
                BackendError::Throttled(message)
            } else {
                BackendError::Rejected { code, message }
            }
        }
        None => BackendError::Transport(DisplayErrorContext(err).to_string()),
    }
}

#[async_trait]
impl MailBackend for SesBackend {
    async fn send(&self, envelope: &Envelope) -> Result<(), BackendError> {
        let raw_message = RawMessage::builder()
            .data(Blob::new(envelope.data()))
            .build()
            .map_err(|e| BackendError::Build(e.to_string()))?;

        self.client
            .send_raw_email()
            .set_configuration_set_name(envelope.configuration_set().map(str::to_string))
            .source(envelope.sender())
            .set_destinations(Some(envelope.recipients().to_vec()))
            .raw_message(raw_message)
            .send()
            .await
            .map_err(|e| classify(&e))?;

        Ok(())
    }
}

/// Rebuilds the SES client from each renewed credential, keeping region and
/// retry settings from the loaded AWS configuration.
#[derive(Debug, Clone)]
pub struct SesClientFactory {
    config: SdkConfig,
}

impl SesClientFactory {
    pub const fn new(config: SdkConfig) -> Self {
        Self { config }
    }
}

impl ClientFactory for SesClientFactory {
    type Client = SesBackend;

    fn build(&self, credential: &Credential) -> SesBackend {
        let credentials = aws_credential_types::Credentials::new(
            credential.access_key(),
            credential.secret_key(),
            credential.session_token().map(str::to_string),
            None,
            PROVIDER_NAME,
        );

        let config = aws_sdk_ses::config::Builder::from(&self.config)
            .credentials_provider(credentials)
            .build();

        SesBackend::new(aws_sdk_ses::Client::from_conf(config))
    }
}
