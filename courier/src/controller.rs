use std::sync::Arc;

use anyhow::Context;
use courier_common::{Signal, config::ServerTimeouts, error::ConfigError, internal};
use courier_credentials::{
    CredentialsConfig, RoleLayer, StsRoleAssumer, SupplyChain, fatal_channel, load_aws_config,
    source_from_config,
};
use courier_health::{HealthChecker, HealthConfig, HealthServer};
use courier_metrics::{Metrics, MetricsConfig, MetricsServer};
use courier_ses::{SendPipeline, SesClientFactory};
use courier_smtp::{Listener, SessionConfig};
use serde::Deserialize;
use tokio::{sync::broadcast, task::JoinSet};

use crate::supervisor;

/// Everything the relay process runs, as read from the configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Courier {
    /// SMTP listen address
    pub listen: String,
    /// Host name announced in the greeting and EHLO reply
    pub banner: String,
    /// SES configuration set attached to every message; empty means none
    pub configuration_set: Option<String>,
    pub credentials: CredentialsConfig,
    pub metrics: MetricsConfig,
    pub health: HealthConfig,
    pub timeouts: ServerTimeouts,
}

impl Default for Courier {
    fn default() -> Self {
        Self {
            listen: "[::]:2500".to_string(),
            banner: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
            configuration_set: None,
            credentials: CredentialsConfig::default(),
            metrics: MetricsConfig::default(),
            health: HealthConfig::default(),
            timeouts: ServerTimeouts::default(),
        }
    }
}

impl Courier {
    /// Parse and validate a RON document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid RON for this structure
    /// or fails validation.
    pub fn from_ron(content: &str) -> anyhow::Result<Self> {
        let courier: Self = ron::from_str(content)?;
        courier.validate()?;
        Ok(courier)
    }

    /// Reject combinations that cannot start
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::MissingField("listen"));
        }

        if self.banner.trim().is_empty() {
            return Err(ConfigError::MissingField("banner"));
        }

        self.credentials.validate()
    }

    /// The configuration set to forward, with an empty name meaning none
    pub fn configuration_set(&self) -> Option<&str> {
        self.configuration_set
            .as_deref()
            .map(str::trim)
            .filter(|set| !set.is_empty())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            banner: Arc::from(self.banner.as_str()),
            timeouts: self.timeouts.clone(),
            configuration_set: self.configuration_set().map(str::to_string),
        }
    }

    /// Start the observability endpoints, acquire credentials, serve SMTP and
    /// wait for an interrupt or a fatal credential error.
    ///
    /// # Errors
    ///
    /// Returns an error if startup fails or a fatal credential error is
    /// reported while running.
    #[tracing::instrument(level = "trace", skip_all, err)]
    pub async fn run(self) -> anyhow::Result<()> {
        self.validate()?;
        let interrupt = supervisor::interrupted().context("Unable to install signal handlers")?;

        internal!(
            level = INFO,
            "courier version {} starting",
            env!("CARGO_PKG_VERSION")
        );

        let metrics = Arc::new(Metrics::new()?);
        let health = Arc::new(HealthChecker::new("courier", env!("CARGO_PKG_VERSION")));
        let (shutdown, _) = broadcast::channel(16);

        let mut observability = JoinSet::new();
        self.start_observability(&metrics, &health, &shutdown, &mut observability)
            .await;

        let sdk_config = load_aws_config().await;
        let source = source_from_config(&self.credentials, &sdk_config)?;
        let role = self.credentials.cross_account_role.clone().map(|role_arn| {
            internal!(level = INFO, "Assuming role {role_arn}");
            RoleLayer {
                assumer: Arc::new(StsRoleAssumer::new(sdk_config.clone())),
                role_arn,
                session_name: self.credentials.session_name.clone(),
            }
        });

        let (reporter, mut fatal) = fatal_channel();
        let mut supply = SupplyChain::start(
            source,
            role,
            self.credentials.renewal.clone(),
            metrics.clone(),
            reporter,
        )
        .await
        .context("Unable to acquire credentials")?;
        health.set_credentials_ready(true);

        let pipeline = SendPipeline::new(
            supply.client_handle(SesClientFactory::new(sdk_config)),
            metrics.clone(),
        );

        let listener = Listener::bind(&self.listen, self.session_config(), pipeline, metrics)
            .await
            .with_context(|| format!("Unable to listen on {}", self.listen))?;
        health.set_smtp_ready(true);

        let result = supervisor::serve(
            listener,
            interrupt,
            &mut fatal,
            &shutdown,
            supervisor::DRAIN_TIMEOUT,
        )
        .await;

        health.set_smtp_ready(false);
        health.set_credentials_ready(false);
        supply.shutdown();
        let _ = shutdown.send(Signal::Shutdown);
        observability.shutdown().await;

        internal!("Shutting down...");

        result
    }

    /// Observability endpoints that fail to bind are logged and skipped;
    /// the relay runs without them.
    async fn start_observability(
        &self,
        metrics: &Arc<Metrics>,
        health: &Arc<HealthChecker>,
        shutdown: &broadcast::Sender<Signal>,
        tasks: &mut JoinSet<()>,
    ) {
        if self.metrics.enabled {
            match MetricsServer::new(&self.metrics, Arc::clone(metrics)).await {
                Ok(server) => {
                    let signal = shutdown.subscribe();
                    tasks.spawn(async move {
                        if let Err(err) = server.serve(signal).await {
                            internal!(level = WARN, "Metrics server stopped: {err}");
                        }
                    });
                }
                Err(err) => internal!(level = WARN, "Metrics endpoint unavailable: {err}"),
            }
        }

        if self.health.enabled {
            match HealthServer::new(&self.health, Arc::clone(health)).await {
                Ok(server) => {
                    let signal = shutdown.subscribe();
                    tasks.spawn(async move {
                        if let Err(err) = server.serve(signal).await {
                            internal!(level = WARN, "Health server stopped: {err}");
                        }
                    });
                }
                Err(err) => internal!(level = WARN, "Health endpoint unavailable: {err}"),
            }
        }
    }
}
