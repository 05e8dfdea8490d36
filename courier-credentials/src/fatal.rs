//! The out-of-band path for errors that must end the process

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use courier_common::internal;
use tokio::sync::mpsc;

use crate::CredentialError;

const CAPACITY: usize = 2;

/// Sends at most one fatal error to the supervisor, however many tasks hold
/// a clone.
#[derive(Debug, Clone)]
pub struct FatalReporter {
    sender: mpsc::Sender<CredentialError>,
    reported: Arc<AtomicBool>,
}

/// Supervisor side of the fatal-error path
pub type FatalReceiver = mpsc::Receiver<CredentialError>;

pub fn fatal_channel() -> (FatalReporter, FatalReceiver) {
    let (sender, receiver) = mpsc::channel(CAPACITY);

    (
        FatalReporter {
            sender,
            reported: Arc::new(AtomicBool::new(false)),
        },
        receiver,
    )
}

impl FatalReporter {
    /// Report a fatal error. Returns `true` only for the first report; later
    /// reports are logged and dropped.
    pub fn report(&self, error: CredentialError) -> bool {
        if self.reported.swap(true, Ordering::AcqRel) {
            internal!(
                level = WARN,
                "Suppressing additional fatal credential error: {error}"
            );
            return false;
        }

        internal!(level = ERROR, "Fatal credential error: {error}");
        if self.sender.try_send(error).is_err() {
            internal!(
                level = ERROR,
                "Fatal credential error could not be delivered, supervisor is gone"
            );
        }

        true
    }

    pub fn has_reported(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }
}
