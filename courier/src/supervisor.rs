//! The shutdown race
//!
//! Exactly two things end the process: an operating-system interrupt, which
//! drains open sessions and exits successfully, and the first fatal
//! credential error, which exits with a failure without waiting for them.

use std::{future::Future, io, time::Duration};

use anyhow::Context;
use courier_common::{Signal, internal};
use courier_credentials::{CredentialError, FatalReceiver};
use courier_ses::MailBackend;
use courier_smtp::Listener;
use tokio::{
    signal::unix::{SignalKind, signal},
    sync::broadcast,
    time::timeout,
};

/// Why the process is stopping
#[derive(Debug)]
pub enum Exit {
    Interrupted,
    Fatal(CredentialError),
}

/// How long an interrupt normally waits for open sessions before abandoning
/// them
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Install the `SIGINT` and `SIGTERM` handlers now, returning a future that
/// resolves once either signal arrives. Signals received before the future
/// is first polled are not lost.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed.
pub fn interrupted() -> io::Result<impl Future<Output = anyhow::Result<()>>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {
                internal!(level = INFO, "CTRL+C entered, shutting down");
            }
            _ = terminate.recv() => {
                internal!(level = INFO, "Terminate signal received, shutting down");
            }
        }

        Ok(())
    })
}

/// Wait for whichever comes first. The loser is never looked at again.
///
/// # Errors
///
/// Returns an error if `interrupt` itself fails.
pub async fn race<F>(interrupt: F, fatal: &mut FatalReceiver) -> anyhow::Result<Exit>
where
    F: Future<Output = anyhow::Result<()>>,
{
    tokio::select! {
        result = interrupt => {
            result?;
            Ok(Exit::Interrupted)
        }
        Some(err) = fatal.recv() => {
            internal!(level = ERROR, "Exiting after fatal credential error: {err}");
            Ok(Exit::Fatal(err))
        }
    }
}

/// Serve SMTP until [`race`] decides the process should stop
///
/// # Errors
///
/// Returns an error for a fatal credential error, or if the listener fails
/// while draining. Sessions still open `drain` after an interrupt are
/// dropped.
pub async fn serve<B, F>(
    listener: Listener<B>,
    interrupt: F,
    fatal: &mut FatalReceiver,
    shutdown: &broadcast::Sender<Signal>,
    drain: Duration,
) -> anyhow::Result<()>
where
    B: MailBackend + 'static,
    F: Future<Output = anyhow::Result<()>>,
{
    let mut relay = tokio::spawn(listener.serve(shutdown.subscribe()));

    let exit = race(interrupt, fatal).await;
    let _ = shutdown.send(Signal::Shutdown);

    match exit {
        Ok(Exit::Interrupted) => {
            internal!(level = INFO, "Waiting for open sessions to finish");
            match timeout(drain, &mut relay).await {
                Ok(finished) => finished.context("SMTP listener task failed")?,
                Err(_) => {
                    internal!(
                        level = WARN,
                        "Sessions still open after {drain:?}, closing them"
                    );
                    relay.abort();
                    Ok(())
                }
            }
        }
        Ok(Exit::Fatal(err)) => {
            relay.abort();
            Err(anyhow::Error::new(err).context("Credential supply chain failed"))
        }
        Err(err) => {
            relay.abort();
            Err(err)
        }
    }
}
