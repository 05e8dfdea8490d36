use std::sync::Arc;

use courier_common::{Envelope, internal, status::Reply};
use courier_credentials::ClientHandle;
use courier_metrics::{Counter, MetricsSink};

use crate::MailBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The backend call failed; the client should retry later
    TemporaryBackendError,
}

/// Result of handing one envelope to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Failed(FailureReason),
}

impl SendOutcome {
    /// The terminal status line reported to the submitting client
    pub fn reply(self) -> Reply {
        match self {
            Self::Sent => Reply::queued(),
            Self::Failed(FailureReason::TemporaryBackendError) => Reply::temporary_failure(),
        }
    }
}

/// Issues exactly one backend call per envelope
#[derive(Debug)]
pub struct SendPipeline<B> {
    backends: ClientHandle<B>,
    metrics: Arc<dyn MetricsSink>,
}

impl<B> Clone for SendPipeline<B> {
    fn clone(&self) -> Self {
        Self {
            backends: self.backends.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<B: MailBackend> SendPipeline<B> {
    pub fn new(backends: ClientHandle<B>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { backends, metrics }
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(sender = envelope.sender(), size = envelope.data().len())
    )]
    pub async fn send(&self, envelope: &Envelope) -> SendOutcome {
        let backend = self.backends.current();

        match backend.send(envelope).await {
            Ok(()) => {
                self.metrics.increment(Counter::SendSuccess);
                internal!(
                    level = INFO,
                    "Sent message from {} to {:?} (configuration set: {})",
                    envelope.sender(),
                    envelope.recipients(),
                    envelope.configuration_set().unwrap_or("none")
                );
                SendOutcome::Sent
            }
            Err(err) => {
                self.metrics.increment(Counter::BackendError);
                self.metrics
                    .increment(Counter::SendFailure(err.metric_label()));
                internal!(level = ERROR, "ses: {err}");
                SendOutcome::Failed(FailureReason::TemporaryBackendError)
            }
        }
    }
}
