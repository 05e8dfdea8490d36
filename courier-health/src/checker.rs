//! Health check logic

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

/// Tracks the readiness of the relay's components
///
/// Flags are plain atomics so the SMTP listener and the credential supply
/// chain can flip them from their own tasks.
#[derive(Debug)]
pub struct HealthChecker {
    name: &'static str,
    version: &'static str,

    /// Whether the SMTP listener is bound and accepting connections
    smtp_ready: AtomicBool,

    /// Whether a valid credential is currently loaded
    credentials_ready: AtomicBool,
}

impl HealthChecker {
    #[must_use]
    pub const fn new(name: &'static str, version: &'static str) -> Self {
        Self {
            name,
            version,
            smtp_ready: AtomicBool::new(false),
            credentials_ready: AtomicBool::new(false),
        }
    }

    /// Mark SMTP as ready (listener bound)
    pub fn set_smtp_ready(&self, ready: bool) {
        self.smtp_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "SMTP readiness updated");
    }

    /// Mark the credential as loaded and valid
    pub fn set_credentials_ready(&self, ready: bool) {
        self.credentials_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "Credential readiness updated");
    }

    /// For liveness we only need to respond at all.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        true
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.smtp_ready.load(Ordering::Relaxed) && self.credentials_ready.load(Ordering::Relaxed)
    }

    /// The fixed-shape `/health` payload
    #[must_use]
    pub const fn status(&self) -> HealthStatus {
        HealthStatus {
            name: self.name,
            status: "ok",
            version: self.version,
        }
    }

    /// Detailed readiness status for debugging
    #[must_use]
    pub fn readiness(&self) -> ReadinessStatus {
        ReadinessStatus {
            ready: self.is_ready(),
            smtp_ready: self.smtp_ready.load(Ordering::Relaxed),
            credentials_ready: self.credentials_ready.load(Ordering::Relaxed),
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub name: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

/// Body of a failing `GET /health/ready`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessStatus {
    pub ready: bool,
    pub smtp_ready: bool,
    pub credentials_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_requires_every_component() {
        let checker = HealthChecker::new("courier", "1.2.3");
        assert!(!checker.is_ready());

        checker.set_smtp_ready(true);
        assert!(!checker.is_ready());

        checker.set_credentials_ready(true);
        assert!(checker.is_ready());

        checker.set_smtp_ready(false);
        assert!(!checker.is_ready());
    }

    #[test]
    fn status_payload_shape() {
        let checker = HealthChecker::new("courier", "1.2.3");
        assert_eq!(
            checker.status(),
            HealthStatus {
                name: "courier",
                status: "ok",
                version: "1.2.3",
            }
        );
    }
}
