//! Scripted collaborators for unit tests

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    CallerIdentity, Credential, CredentialError, CredentialSource, Lease, Provenance, RoleAssumer,
};

pub fn leased(access_key: &str, lifetime: Duration) -> Credential {
    Credential::new(access_key, "secret", None, Provenance::Dynamic).with_lease(Lease {
        id: format!("aws/creds/mail/{access_key}"),
        duration: lifetime,
        renewable: true,
    })
}

/// Plays back a fixed sequence of fetch/renew results
#[derive(Debug, Default)]
pub struct ScriptedSource {
    results: Mutex<VecDeque<Result<Credential, CredentialError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(results: impl IntoIterator<Item = Result<Credential, CredentialError>>) -> Self {
        Self {
            results: Mutex::new(results.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self) -> Result<Credential, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .map_err(|_| CredentialError::Provider("poisoned".to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(CredentialError::SecretStore("script exhausted".to_string())))
    }
}

/// Assumes roles locally, recording the base credential it was given
#[derive(Debug)]
pub struct ScriptedAssumer {
    pub lifetime: Duration,
    pub identity_fails: bool,
    pub fail: AtomicBool,
    pub(crate) bases: Mutex<Vec<String>>,
}

impl Default for ScriptedAssumer {
    fn default() -> Self {
        Self {
            lifetime: Duration::from_secs(3600),
            identity_fails: false,
            fail: AtomicBool::new(false),
            bases: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedAssumer {
    pub fn bases(&self) -> Vec<String> {
        self.bases.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RoleAssumer for ScriptedAssumer {
    async fn assume(
        &self,
        base: &Credential,
        role_arn: &str,
        _session_name: &str,
    ) -> Result<Credential, CredentialError> {
        if let Ok(mut bases) = self.bases.lock() {
            bases.push(base.access_key().to_string());
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(CredentialError::RoleAssumption {
                role: role_arn.to_string(),
                reason: "AccessDenied".to_string(),
            });
        }

        Ok(Credential::new(
            format!("ASSUMED-{}", base.access_key()),
            "assumed-secret",
            Some("assumed-token".to_string()),
            Provenance::Assumed,
        )
        .expiring_in(self.lifetime))
    }

    async fn caller_identity(
        &self,
        _credential: &Credential,
    ) -> Result<CallerIdentity, CredentialError> {
        if self.identity_fails {
            return Err(CredentialError::Provider("identity unavailable".to_string()));
        }

        Ok(CallerIdentity {
            account: "123456789012".to_string(),
            arn: "arn:aws:sts::123456789012:assumed-role/mail/courier".to_string(),
        })
    }
}
