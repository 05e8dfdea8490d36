//! Background renewal of one supply-chain layer

use std::sync::Arc;

use courier_common::internal;
use courier_metrics::{Counter, MetricsSink};
use tokio::{
    sync::watch,
    time::{Instant, sleep},
};

use crate::{Credential, CredentialError, CredentialSource, FatalReporter, RenewalPolicy};

/// Keeps one layer's credential valid and publishes each replacement.
///
/// Every tick waits a fraction of the remaining lifetime, then renews. A
/// failed attempt is retried with exponential backoff until the next retry
/// would land past `expiry - margin`, at which point the failure is reported
/// as fatal and the task ends.
pub(crate) struct Renewer {
    pub(crate) source: Arc<dyn CredentialSource>,
    pub(crate) policy: RenewalPolicy,
    pub(crate) metrics: Arc<dyn MetricsSink>,
    pub(crate) publish: watch::Sender<Credential>,
    pub(crate) fatal: FatalReporter,
}

impl Renewer {
    pub(crate) async fn run(self) {
        let layer = self.source.name();

        loop {
            let current = self.publish.borrow().clone();

            let Some(expires_at) = current.expires_at() else {
                internal!(
                    level = DEBUG,
                    "{layer} credential does not expire, nothing to renew"
                );
                return;
            };

            let remaining = expires_at.saturating_duration_since(Instant::now());
            let wait = self.policy.first_attempt_after(remaining);
            internal!(
                level = DEBUG,
                "Renewing {layer} credential in {wait:?} (expires in {remaining:?})"
            );
            sleep(wait).await;

            if self.fatal.has_reported() {
                internal!(
                    level = DEBUG,
                    "Credential chain already failed, not renewing {layer} credential"
                );
                return;
            }

            match self.renew(&current, expires_at).await {
                Ok(credential) => {
                    self.publish.send_replace(credential);
                }
                Err(err) => {
                    self.fatal.report(err);
                    return;
                }
            }
        }
    }

    async fn renew(
        &self,
        current: &Credential,
        expires_at: Instant,
    ) -> Result<Credential, CredentialError> {
        let layer = self.source.name();
        let deadline = expires_at
            .checked_sub(self.policy.expiry_margin())
            .unwrap_or(expires_at);
        let mut backoff = self.policy.base_backoff();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.source.renew(current).await {
                Ok(credential) => {
                    self.metrics.increment(Counter::RenewalSuccess);
                    internal!(
                        level = INFO,
                        "Renewed {layer} credential {} (valid for {:?})",
                        credential.access_key(),
                        credential.remaining()
                    );
                    return Ok(credential);
                }
                Err(err) => {
                    self.metrics.increment(Counter::RenewalError);
                    internal!(
                        level = WARN,
                        "Renewal attempt {attempts} for {layer} credential failed: {err}"
                    );

                    let next_attempt = Instant::now().checked_add(backoff);
                    if current.is_expired() || next_attempt.is_none_or(|next| next > deadline) {
                        return Err(CredentialError::Renewal {
                            layer,
                            attempts,
                            cause: Box::new(err),
                        });
                    }

                    sleep(backoff).await;
                    backoff = backoff.saturating_mul(2).min(self.policy.max_backoff());
                }
            }
        }
    }
}
