use std::{
    fmt,
    time::{Duration, SystemTime},
};

use tokio::time::Instant;

/// Where a credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// The ambient AWS provider chain
    Ambient,
    /// A dynamic secret issued by the secret store
    Dynamic,
    /// Temporary credentials from a cross-account role assumption
    Assumed,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ambient => "ambient",
            Self::Dynamic => "dynamic",
            Self::Assumed => "assumed",
        })
    }
}

/// A secret-store lease attached to a dynamic credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub id: String,
    pub duration: Duration,
    pub renewable: bool,
}

/// A complete set of AWS credentials
///
/// Values are immutable; renewal always produces a new `Credential` which
/// replaces the old one as a whole.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
    expires_at: Option<Instant>,
    lease: Option<Lease>,
    provenance: Provenance,
}

impl Credential {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        session_token: Option<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token,
            expires_at: None,
            lease: None,
            provenance,
        }
    }

    /// Expire `lifetime` from now. A lifetime too long to represent is
    /// treated as never expiring.
    #[must_use]
    pub fn expiring_in(mut self, lifetime: Duration) -> Self {
        self.expires_at = Instant::now().checked_add(lifetime);
        self
    }

    /// Expire at a wall-clock time, as reported by AWS
    #[must_use]
    pub fn expiring_at(self, expiry: SystemTime) -> Self {
        let lifetime = expiry
            .duration_since(SystemTime::now())
            .unwrap_or_default();
        self.expiring_in(lifetime)
    }

    /// Attach a lease, which also sets the expiry to the lease duration
    #[must_use]
    pub fn with_lease(self, lease: Lease) -> Self {
        let duration = lease.duration;
        let mut credential = self.expiring_in(duration);
        credential.lease = Some(lease);
        credential
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub const fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub const fn lease(&self) -> Option<&Lease> {
        self.lease.as_ref()
    }

    pub const fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Lifetime left before expiry, `None` if the credential never expires
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("lease", &self.lease)
            .field("provenance", &self.provenance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn lease_sets_expiry() {
        let credential = Credential::new("AKID", "secret", None, Provenance::Dynamic).with_lease(
            Lease {
                id: "aws/creds/mail/abc".to_string(),
                duration: Duration::from_secs(60),
                renewable: true,
            },
        );

        assert_eq!(credential.remaining(), Some(Duration::from_secs(60)));
        assert!(!credential.is_expired());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(credential.is_expired());
        assert_eq!(credential.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn ambient_without_expiry_never_expires() {
        let credential = Credential::new("AKID", "secret", None, Provenance::Ambient);
        assert_eq!(credential.remaining(), None);
        assert!(!credential.is_expired());
    }

    #[test]
    fn unrepresentable_lifetime_never_expires() {
        let credential =
            Credential::new("AKID", "secret", None, Provenance::Dynamic).expiring_in(Duration::MAX);
        assert_eq!(credential.remaining(), None);
        assert!(!credential.is_expired());
    }

    #[test]
    fn secrets_are_redacted() {
        let credential = Credential::new(
            "AKID",
            "wJalrXUtnFEMI",
            Some("FwoGZXIvYXdzE".to_string()),
            Provenance::Assumed,
        );
        let debug = format!("{credential:?}");
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("wJalrXUtnFEMI"));
        assert!(!debug.contains("FwoGZXIvYXdzE"));
    }
}
