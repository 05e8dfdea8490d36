use std::{net::SocketAddr, sync::Arc};

use courier_common::{Signal, internal};
use courier_metrics::MetricsSink;
use courier_ses::{MailBackend, SendPipeline};
use tokio::{net::TcpListener, sync::broadcast, task::JoinSet};

use crate::{Session, SessionConfig};

/// Accepts SMTP connections and runs a [`Session`] for each one
pub struct Listener<Backend> {
    listener: TcpListener,
    config: SessionConfig,
    pipeline: SendPipeline<Backend>,
    metrics: Arc<dyn MetricsSink>,
}

impl<Backend: MailBackend + 'static> Listener<Backend> {
    /// Bind the SMTP socket
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(
        address: &str,
        config: SessionConfig,
        pipeline: SendPipeline<Backend>,
        metrics: Arc<dyn MetricsSink>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        internal!(level = INFO, "SMTP listener bound to {}", listener.local_addr()?);

        Ok(Self {
            listener,
            config,
            pipeline,
            metrics,
        })
    }

    /// Address actually bound, useful when listening on port 0
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown, then wait for open sessions to
    /// finish. Sessions are told about the shutdown themselves.
    ///
    /// # Errors
    ///
    /// Currently never fails; accept errors are logged and skipped.
    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn serve(self, mut shutdown: broadcast::Receiver<Signal>) -> anyhow::Result<()> {
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    if matches!(sig, Ok(Signal::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                        internal!(level = INFO, "SMTP listener received shutdown signal, finishing sessions ...");
                        break;
                    }
                }

                connection = self.listener.accept() => {
                    let (stream, peer) = match connection {
                        Ok(connection) => connection,
                        Err(err) => {
                            internal!(level = WARN, "Failed to accept connection: {err}");
                            continue;
                        }
                    };
                    tracing::debug!("Connection received from {peer}");

                    let session = Session::new(
                        stream,
                        peer,
                        &self.config,
                        self.pipeline.clone(),
                        Arc::clone(&self.metrics),
                    );
                    let signal = shutdown.resubscribe();

                    sessions.spawn(async move {
                        match session.run(signal).await {
                            Ok(()) => {}
                            Err(err) if err.is_shutdown() => {}
                            Err(err) if err.is_client_error() => {
                                internal!(level = INFO, "Session with {peer} ended: {err}");
                            }
                            Err(err) => internal!(level = WARN, "Session with {peer} ended: {err}"),
                        }
                    });
                }

                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(err) = finished {
                        internal!(level = ERROR, "Session task failed: {err}");
                    }
                }
            }
        }

        while let Some(finished) = sessions.join_next().await {
            if let Err(err) = finished {
                internal!(level = ERROR, "Session task failed: {err}");
            }
        }

        Ok(())
    }
}
