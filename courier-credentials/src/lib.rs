//! Credential supply chain for the courier relay
//!
//! Acquires the credential used to call the mail-sending backend, keeps it
//! valid for the life of the process and publishes every replacement through
//! an atomically swapped [`ClientHandle`].
//!
//! The chain is built from layers:
//!
//! - a base [`CredentialSource`]: the ambient AWS provider chain
//!   ([`AmbientSource`]) or a dynamic secret read from Vault ([`VaultSource`])
//! - an optional cross-account [`RoleLayer`] that exchanges the base
//!   credential for a scoped one through a [`RoleAssumer`]
//!
//! Each layer whose credential expires gets its own renewal task. A renewal
//! that cannot succeed before the credential expires is reported once through
//! the [`FatalReporter`], and the supervisor terminates the process.

mod config;
mod credential;
mod error;
mod fatal;
mod handle;
mod renewal;
mod role;
mod source;
mod supply;

#[cfg(test)]
mod testing;

pub use config::{CredentialsConfig, RenewalPolicy, SourceConfig, VaultConfig};
pub use credential::{Credential, Lease, Provenance};
pub use error::CredentialError;
pub use fatal::{FatalReceiver, FatalReporter, fatal_channel};
pub use handle::{ClientFactory, ClientHandle};
pub use role::{CallerIdentity, RoleAssumer, RoleLayer, StsRoleAssumer};
pub use source::{
    AmbientSource, CredentialSource,
    vault::{VaultClient, VaultSource},
};
pub use supply::{SupplyChain, load_aws_config, source_from_config};
