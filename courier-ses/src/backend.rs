use std::fmt::Debug;

use async_trait::async_trait;
use courier_common::Envelope;

use crate::BackendError;

/// The mail-sending backend collaborator.
///
/// One call per envelope: sender, ordered recipients, raw bytes and the
/// optional configuration-set tag. No batching and no per-recipient
/// outcomes.
#[async_trait]
pub trait MailBackend: Send + Sync + Debug {
    async fn send(&self, envelope: &Envelope) -> Result<(), BackendError>;
}
