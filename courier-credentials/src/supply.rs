//! Assembles the layers of the supply chain and owns their renewal tasks

use std::sync::Arc;

use aws_config::{BehaviorVersion, SdkConfig};
use courier_common::internal;
use courier_metrics::MetricsSink;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    AmbientSource, ClientFactory, ClientHandle, Credential, CredentialError, CredentialSource,
    CredentialsConfig, FatalReporter, RenewalPolicy, RoleLayer, SourceConfig, VaultClient,
    VaultSource, handle, renewal::Renewer, role::AssumedRoleSource,
};

/// Load region and the default provider chain from the environment
pub async fn load_aws_config() -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest()).load().await
}

/// Build the base credential source selected by the configuration
///
/// # Errors
///
/// Returns a configuration error if the selected source is incompletely
/// specified, or the ambient chain has no provider.
pub fn source_from_config(
    config: &CredentialsConfig,
    sdk_config: &SdkConfig,
) -> Result<Arc<dyn CredentialSource>, CredentialError> {
    config.validate()?;

    match &config.source {
        SourceConfig::Ambient => {
            let provider = sdk_config.credentials_provider().ok_or(
                courier_common::error::ConfigError::Invalid {
                    field: "credentials.source",
                    reason: "no ambient credential provider is available".to_string(),
                },
            )?;

            internal!(level = INFO, "Using ambient AWS credential provider chain");
            Ok(Arc::new(AmbientSource::new(provider)))
        }
        SourceConfig::Vault { path } => {
            internal!(
                level = INFO,
                "Using vault credential at {path} from {}",
                config.vault.address
            );
            Ok(Arc::new(VaultSource::new(
                VaultClient::new(&config.vault)?,
                path.clone(),
            )))
        }
    }
}

/// A running credential supply chain
#[derive(Debug)]
pub struct SupplyChain {
    credentials: watch::Receiver<Credential>,
    tasks: Vec<JoinHandle<()>>,
}

impl SupplyChain {
    /// Acquire the initial credential(s) and start renewing them
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Fetch`] if the base credential or the
    /// initial role assumption cannot be acquired.
    pub async fn start(
        base: Arc<dyn CredentialSource>,
        role: Option<RoleLayer>,
        policy: RenewalPolicy,
        metrics: Arc<dyn MetricsSink>,
        fatal: FatalReporter,
    ) -> Result<Self, CredentialError> {
        let mut tasks = Vec::new();

        let mut credentials =
            Self::layer(base, policy.clone(), &metrics, &fatal, &mut tasks).await?;

        if let Some(layer) = role {
            let source = Arc::new(AssumedRoleSource::new(layer, credentials.clone()));
            match Self::layer(source.clone(), policy, &metrics, &fatal, &mut tasks).await {
                Ok(assumed) => credentials = assumed,
                Err(err) => {
                    tasks.iter().for_each(JoinHandle::abort);
                    return Err(err);
                }
            }

            let assumed = credentials.borrow().clone();
            source.log_identity(&assumed).await;
        }

        Ok(Self { credentials, tasks })
    }

    async fn layer(
        source: Arc<dyn CredentialSource>,
        policy: RenewalPolicy,
        metrics: &Arc<dyn MetricsSink>,
        fatal: &FatalReporter,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> Result<watch::Receiver<Credential>, CredentialError> {
        let source_name = source.name();
        let credential = source
            .fetch()
            .await
            .map_err(|cause| CredentialError::Fetch {
                source_name,
                cause: Box::new(cause),
            })?;

        internal!(
            level = INFO,
            "Acquired {} credential from {source_name} (expires in {:?})",
            credential.provenance(),
            credential.remaining()
        );

        let (publish, credentials) = watch::channel(credential);

        tasks.push(tokio::spawn(
            Renewer {
                source,
                policy,
                metrics: Arc::clone(metrics),
                publish,
                fatal: fatal.clone(),
            }
            .run(),
        ));

        Ok(credentials)
    }

    /// The most recent credential of the outermost layer
    pub fn current(&self) -> Credential {
        self.credentials.borrow().clone()
    }

    /// Subscribe to credential replacements
    pub fn subscribe(&self) -> watch::Receiver<Credential> {
        self.credentials.clone()
    }

    /// Create a client handle that is rebuilt on every renewal
    pub fn client_handle<F: ClientFactory>(&mut self, factory: F) -> ClientHandle<F::Client> {
        let mut credentials = self.credentials.clone();
        let initial = factory.build(&credentials.borrow_and_update());
        let (clients, current) = watch::channel(Arc::new(initial));

        self.tasks
            .push(tokio::spawn(handle::follow(factory, credentials, clients)));

        ClientHandle::new(current)
    }

    /// Stop every renewal task
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use courier_metrics::{Counter, Metrics};

    use super::*;
    use crate::{
        Provenance, fatal_channel,
        testing::{ScriptedAssumer, ScriptedSource, leased},
    };

    struct KeyFactory;

    impl ClientFactory for KeyFactory {
        type Client = String;

        fn build(&self, credential: &Credential) -> String {
            credential.access_key().to_string()
        }
    }

    fn role(assumer: Arc<ScriptedAssumer>) -> RoleLayer {
        RoleLayer {
            assumer,
            role_arn: "arn:aws:iam::123456789012:role/mail".to_string(),
            session_name: "courier".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn initial_fetch_failure_is_reported_as_fetch() {
        let (fatal, _rx) = fatal_channel();
        let result = SupplyChain::start(
            Arc::new(ScriptedSource::new([])),
            None,
            RenewalPolicy::default(),
            Arc::new(Metrics::new().unwrap()),
            fatal,
        )
        .await;

        assert!(matches!(
            result,
            Err(CredentialError::Fetch {
                source_name: "scripted",
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn client_handle_follows_renewals() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let (fatal, _rx) = fatal_channel();
        let source = Arc::new(ScriptedSource::new([
            Ok(leased("FIRST", Duration::from_secs(60))),
            Ok(leased("SECOND", Duration::from_secs(3600))),
        ]));

        let mut chain = SupplyChain::start(
            source,
            None,
            RenewalPolicy::default(),
            metrics.clone(),
            fatal,
        )
        .await
        .unwrap();

        let handle = chain.client_handle(KeyFactory);
        assert_eq!(handle.current().as_str(), "FIRST");

        let mut updates = chain.subscribe();
        updates.changed().await.unwrap();
        for _ in 0..10 {
            if handle.current().as_str() == "SECOND" {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(chain.current().access_key(), "SECOND");
        assert_eq!(handle.current().as_str(), "SECOND");
        assert_eq!(metrics.value(Counter::RenewalSuccess), 1);

        chain.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn role_layer_wraps_base() {
        let (fatal, _rx) = fatal_channel();
        let assumer = Arc::new(ScriptedAssumer::default());

        let chain = SupplyChain::start(
            Arc::new(ScriptedSource::new([Ok(Credential::new(
                "BASE",
                "secret",
                None,
                Provenance::Ambient,
            ))])),
            Some(role(assumer.clone())),
            RenewalPolicy::default(),
            Arc::new(Metrics::new().unwrap()),
            fatal,
        )
        .await
        .unwrap();

        let current = chain.current();
        assert_eq!(current.access_key(), "ASSUMED-BASE");
        assert_eq!(current.provenance(), Provenance::Assumed);
        assert_eq!(assumer.bases(), vec!["BASE".to_string()]);

        chain.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn role_renewal_failure_is_fatal() {
        let (fatal, mut fatal_rx) = fatal_channel();
        let assumer = Arc::new(ScriptedAssumer {
            lifetime: Duration::from_secs(900),
            ..ScriptedAssumer::default()
        });

        let chain = SupplyChain::start(
            Arc::new(ScriptedSource::new([Ok(Credential::new(
                "BASE",
                "secret",
                None,
                Provenance::Ambient,
            ))])),
            Some(role(assumer.clone())),
            RenewalPolicy::default(),
            Arc::new(Metrics::new().unwrap()),
            fatal,
        )
        .await
        .unwrap();

        assumer
            .fail
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let err = fatal_rx.recv().await.unwrap();
        assert!(matches!(err, CredentialError::Renewal { layer: "role", .. }));

        chain.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn identity_failure_does_not_block_start() {
        let (fatal, _rx) = fatal_channel();
        let assumer = Arc::new(ScriptedAssumer {
            identity_fails: true,
            ..ScriptedAssumer::default()
        });

        let chain = SupplyChain::start(
            Arc::new(ScriptedSource::new([Ok(Credential::new(
                "BASE",
                "secret",
                None,
                Provenance::Ambient,
            ))])),
            Some(role(assumer)),
            RenewalPolicy::default(),
            Arc::new(Metrics::new().unwrap()),
            fatal,
        )
        .await;

        assert!(chain.is_ok());
    }
}
