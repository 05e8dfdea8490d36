//! Process-wide counters behind an increment-by-name sink

use std::fmt::Debug;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::MetricsError;

const NAMESPACE: &str = "smtpd";

/// Named counters known to the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter<'a> {
    /// A message was accepted by the mail-sending backend
    SendSuccess,
    /// A message failed, labelled with the failure type
    SendFailure(&'a str),
    /// The mail-sending backend returned an error
    BackendError,
    /// A credential renewal attempt succeeded
    RenewalSuccess,
    /// A credential renewal attempt failed
    RenewalError,
}

impl Counter<'_> {
    /// Fully qualified metric name as exposed on `/metrics`
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SendSuccess => "smtpd_email_send_success_total",
            Self::SendFailure(_) => "smtpd_email_send_fail_total",
            Self::BackendError => "smtpd_ses_error_total",
            Self::RenewalSuccess => "smtpd_credential_renewal_success_total",
            Self::RenewalError => "smtpd_credential_renewal_error_total",
        }
    }
}

/// Observability capability injected into the send pipeline and the
/// credential supply chain.
///
/// Implementations must tolerate concurrent increments from any number of
/// sessions without losing updates.
pub trait MetricsSink: Send + Sync + Debug {
    fn increment(&self, counter: Counter<'_>);
}

/// Prometheus-backed counter registry
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    send_success: IntCounter,
    send_failure: IntCounterVec,
    backend_error: IntCounter,
    renewal_success: IntCounter,
    renewal_error: IntCounter,
}

impl Metrics {
    /// Create and register every counter in a fresh registry
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be created or registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let send_success = IntCounter::with_opts(
            Opts::new(
                "email_send_success_total",
                "Total number of successfully sent emails",
            )
            .namespace(NAMESPACE),
        )?;

        let send_failure = IntCounterVec::new(
            Opts::new(
                "email_send_fail_total",
                "Total number of emails that failed to send",
            )
            .namespace(NAMESPACE),
            &["type"],
        )?;

        let backend_error = IntCounter::with_opts(
            Opts::new("ses_error_total", "Total number of errors returned by SES")
                .namespace(NAMESPACE),
        )?;

        let renewal_success = IntCounter::with_opts(
            Opts::new(
                "credential_renewal_success_total",
                "Total number of successful credential renewals",
            )
            .namespace(NAMESPACE),
        )?;

        let renewal_error = IntCounter::with_opts(
            Opts::new(
                "credential_renewal_error_total",
                "Total number of failed credential renewal attempts",
            )
            .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(send_success.clone()))?;
        registry.register(Box::new(send_failure.clone()))?;
        registry.register(Box::new(backend_error.clone()))?;
        registry.register(Box::new(renewal_success.clone()))?;
        registry.register(Box::new(renewal_error.clone()))?;

        Ok(Self {
            registry,
            send_success,
            send_failure,
            backend_error,
            renewal_success,
            renewal_error,
        })
    }

    /// Current value of a counter
    pub fn value(&self, counter: Counter<'_>) -> u64 {
        match counter {
            Counter::SendSuccess => self.send_success.get(),
            Counter::SendFailure(kind) => self.send_failure.with_label_values(&[kind]).get(),
            Counter::BackendError => self.backend_error.get(),
            Counter::RenewalSuccess => self.renewal_success.get(),
            Counter::RenewalError => self.renewal_error.get(),
        }
    }

    /// Encode all counters in the Prometheus text exposition format
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Export(e.to_string()))
    }
}

impl MetricsSink for Metrics {
    fn increment(&self, counter: Counter<'_>) {
        match counter {
            Counter::SendSuccess => self.send_success.inc(),
            Counter::SendFailure(kind) => self.send_failure.with_label_values(&[kind]).inc(),
            Counter::BackendError => self.backend_error.inc(),
            Counter::RenewalSuccess => self.renewal_success.inc(),
            Counter::RenewalError => self.renewal_error.inc(),
        }
    }
}
