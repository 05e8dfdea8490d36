//! Configuration for the credential supply chain

use std::{fmt, time::Duration};

use courier_common::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Longest configurable retry delay, one hour
pub const MAX_BACKOFF_LIMIT_SECS: u64 = 60 * 60;

/// Where the base credential comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceConfig {
    /// The standard AWS provider chain (environment, profile, instance role)
    #[default]
    Ambient,

    /// A dynamic secret at `path` in Vault, e.g. `aws/creds/my-mail-user`
    Vault { path: String },
}

/// Connection settings for the Vault server
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "defaults::vault_address")]
    pub address: String,

    #[serde(default = "defaults::vault_token", skip_serializing)]
    pub token: Option<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: defaults::vault_address(),
            token: defaults::vault_token(),
        }
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Timing of renewal attempts relative to a credential's lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalPolicy {
    /// Fraction of the remaining lifetime to wait before the first attempt
    #[serde(default = "defaults::renew_at_fraction")]
    pub renew_at_fraction: f64,

    /// Delay after the first failed attempt, doubled after each failure
    #[serde(default = "defaults::base_backoff_secs")]
    pub base_backoff_secs: u64,

    #[serde(default = "defaults::max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// A retry scheduled later than `expiry - margin` is not attempted
    #[serde(default = "defaults::expiry_margin_secs")]
    pub expiry_margin_secs: u64,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            renew_at_fraction: defaults::renew_at_fraction(),
            base_backoff_secs: defaults::base_backoff_secs(),
            max_backoff_secs: defaults::max_backoff_secs(),
            expiry_margin_secs: defaults::expiry_margin_secs(),
        }
    }
}

impl RenewalPolicy {
    pub const fn base_backoff(&self) -> Duration {
        Duration::from_secs(self.base_backoff_secs)
    }

    pub const fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub const fn expiry_margin(&self) -> Duration {
        Duration::from_secs(self.expiry_margin_secs)
    }

    /// Delay before the first renewal attempt for a credential with
    /// `remaining` lifetime left.
    pub fn first_attempt_after(&self, remaining: Duration) -> Duration {
        remaining.mul_f64(self.renew_at_fraction)
    }

    /// Validate the policy
    ///
    /// # Errors
    ///
    /// Returns an error if the fraction is outside `(0, 1]`, the backoff
    /// bounds are inverted, or the maximum backoff exceeds
    /// [`MAX_BACKOFF_LIMIT_SECS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.renew_at_fraction > 0.0 && self.renew_at_fraction <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "credentials.renewal.renew_at_fraction",
                reason: format!("{} is not within (0, 1]", self.renew_at_fraction),
            });
        }

        if self.base_backoff_secs == 0 || self.base_backoff_secs > self.max_backoff_secs {
            return Err(ConfigError::Invalid {
                field: "credentials.renewal.base_backoff_secs",
                reason: format!(
                    "must be non-zero and no greater than max_backoff_secs ({})",
                    self.max_backoff_secs
                ),
            });
        }

        if self.max_backoff_secs > MAX_BACKOFF_LIMIT_SECS {
            return Err(ConfigError::Invalid {
                field: "credentials.renewal.max_backoff_secs",
                reason: format!("must not exceed {MAX_BACKOFF_LIMIT_SECS}"),
            });
        }

        Ok(())
    }
}

/// Everything needed to build the credential supply chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub source: SourceConfig,

    /// ARN of a role to assume for sending, if any
    #[serde(default)]
    pub cross_account_role: Option<String>,

    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub renewal: RenewalPolicy,

    /// Session name used when assuming `cross_account_role`
    #[serde(default = "defaults::session_name")]
    pub session_name: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            cross_account_role: None,
            vault: VaultConfig::default(),
            renewal: RenewalPolicy::default(),
            session_name: defaults::session_name(),
        }
    }
}

impl CredentialsConfig {
    /// Check the source and flag combination before anything is fetched
    ///
    /// # Errors
    ///
    /// Returns an error when the Vault source is incompletely specified or
    /// the role ARN is present but blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let SourceConfig::Vault { path } = &self.source {
            if path.trim().is_empty() {
                return Err(ConfigError::MissingField("credentials.source.path"));
            }

            if self.vault.address.trim().is_empty() {
                return Err(ConfigError::MissingField("credentials.vault.address"));
            }

            if self
                .vault
                .token
                .as_deref()
                .is_none_or(|token| token.trim().is_empty())
            {
                return Err(ConfigError::MissingField("credentials.vault.token"));
            }
        }

        if self
            .cross_account_role
            .as_deref()
            .is_some_and(|role| role.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "credentials.cross_account_role",
                reason: "must not be blank".to_string(),
            });
        }

        if self.session_name.trim().is_empty() {
            return Err(ConfigError::MissingField("credentials.session_name"));
        }

        self.renewal.validate()
    }
}

mod defaults {
    pub fn vault_address() -> String {
        std::env::var("VAULT_ADDR").unwrap_or_else(|_| "https://127.0.0.1:8200".to_string())
    }

    pub fn vault_token() -> Option<String> {
        std::env::var("VAULT_TOKEN").ok()
    }

    pub const fn renew_at_fraction() -> f64 {
        2.0 / 3.0
    }

    pub const fn base_backoff_secs() -> u64 {
        1
    }

    pub const fn max_backoff_secs() -> u64 {
        30
    }

    pub const fn expiry_margin_secs() -> u64 {
        5
    }

    pub fn session_name() -> String {
        "courier".to_string()
    }
}
