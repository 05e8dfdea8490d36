use std::{net::SocketAddr, sync::Arc, time::Duration};

use courier_common::{
    Signal,
    config::ServerTimeouts,
    error::SessionError,
    incoming, internal, outgoing,
    status::{EnhancedCode, Reply, Status},
};
use courier_metrics::{Counter, MetricsSink};
use courier_ses::{MailBackend, SendPipeline};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::broadcast,
    time::{Instant, timeout},
};

use crate::{
    MAX_MESSAGE_SIZE, State, Transaction, TransactionError,
    command::{Command, HeloVariant},
    connection::Connection,
};

/// RFC 5321 allows 512 octets per command line; leave headroom for
/// parameters.
const MAX_COMMAND_LINE: usize = 4096;

/// Largest single read while receiving message data
const DATA_CHUNK: usize = 64 * 1024;

/// Stand-in lifetime when the configured one does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Settings shared by every session of a listener
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub banner: Arc<str>,
    pub timeouts: ServerTimeouts,
    pub configuration_set: Option<String>,
}

pub struct Session<Stream, Backend> {
    peer: SocketAddr,
    connection: Connection<Stream>,
    transaction: Transaction,
    pipeline: SendPipeline<Backend>,
    metrics: Arc<dyn MetricsSink>,
    banner: Arc<str>,
    timeouts: ServerTimeouts,
    greeted: bool,
    start_time: Instant,
}

/// When a session gives up waiting, and the timeout reported for it
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    secs: u64,
}

impl Deadline {
    fn earlier(self, other: Self) -> Self {
        if other.at < self.at { other } else { self }
    }
}

fn ok(detail: u16, message: &'static str) -> Reply {
    Reply::enhanced(Status::Ok, EnhancedCode::new(2, 1, detail), message)
}

impl<Stream, Backend> Session<Stream, Backend>
where
    Stream: AsyncRead + AsyncWrite + Unpin + Send,
    Backend: MailBackend,
{
    pub fn new(
        stream: Stream,
        peer: SocketAddr,
        config: &SessionConfig,
        pipeline: SendPipeline<Backend>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            peer,
            connection: Connection::new(stream),
            transaction: Transaction::new(config.configuration_set.clone()),
            pipeline,
            metrics,
            banner: Arc::clone(&config.banner),
            timeouts: config.timeouts.clone(),
            greeted: false,
            start_time: Instant::now(),
        }
    }

    /// Serve the connection until QUIT, disconnect, timeout or shutdown
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, timeout or shutdown. The client has
    /// been sent a `421` where the connection still allowed it.
    #[tracing::instrument(level = "debug", skip_all, fields(peer = %self.peer))]
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        internal!("Connected");

        let greeting = Reply::new(
            Status::ServiceReady,
            format!("{} ESMTP courier", self.banner),
        );
        self.reply(&greeting).await?;

        let result = self.serve(&mut shutdown).await;

        let farewell = match &result {
            Err(SessionError::Timeout(_)) => Some(Reply::enhanced(
                Status::Unavailable,
                EnhancedCode::new(4, 4, 2),
                format!("{} Error: timeout exceeded", self.banner),
            )),
            Err(SessionError::Shutdown) => Some(Reply::enhanced(
                Status::Unavailable,
                EnhancedCode::new(4, 3, 0),
                format!("{} Service shutting down", self.banner),
            )),
            _ => None,
        };

        if let Some(farewell) = farewell {
            let _ = self.reply(&farewell).await;
        }

        self.transaction.close();
        internal!("Disconnected");
        result
    }

    async fn serve(
        &mut self,
        shutdown: &mut broadcast::Receiver<Signal>,
    ) -> Result<(), SessionError> {
        let idle_secs = self.timeouts.command_secs;
        let lifetime = self.lifetime();

        loop {
            let mut line = Vec::new();
            let read = self
                .next_line(shutdown, MAX_COMMAND_LINE, idle_secs, lifetime, &mut line)
                .await?;

            if read == 0 {
                return Ok(());
            }

            if !line.ends_with(b"\n") {
                while !line.ends_with(b"\n") {
                    line.clear();
                    let read = self
                        .next_line(shutdown, MAX_COMMAND_LINE, idle_secs, lifetime, &mut line)
                        .await?;
                    if read == 0 {
                        return Ok(());
                    }
                }

                self.reply(&Reply::enhanced(
                    Status::SyntaxError,
                    EnhancedCode::new(5, 5, 2),
                    "Error: line too long",
                ))
                .await?;
                continue;
            }

            let command = Command::try_from(line.as_slice()).unwrap_or_else(|e| e);
            incoming!("{command}");

            if self.handle(command, shutdown).await? {
                return Ok(());
            }
        }
    }

    /// The point at which the connection is closed regardless of activity
    fn lifetime(&self) -> Deadline {
        let at = self
            .start_time
            .checked_add(self.timeouts.connection())
            .or_else(|| self.start_time.checked_add(FAR_FUTURE))
            .unwrap_or(self.start_time);

        Deadline {
            at,
            secs: self.timeouts.connection_secs,
        }
    }

    /// Read one line, giving up on shutdown, after `idle_secs` without
    /// input, or once `deadline` has passed.
    async fn next_line(
        &mut self,
        shutdown: &mut broadcast::Receiver<Signal>,
        limit: usize,
        idle_secs: u64,
        deadline: Deadline,
        line: &mut Vec<u8>,
    ) -> Result<usize, SessionError> {
        let remaining = deadline.at.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            internal!(
                level = WARN,
                "Deadline of {}s exceeded, closing",
                deadline.secs
            );
            return Err(SessionError::Timeout(deadline.secs));
        }

        let idle = Duration::from_secs(idle_secs);
        let (wait, secs) = if remaining < idle {
            (remaining, deadline.secs)
        } else {
            (idle, idle_secs)
        };

        tokio::select! {
            _ = shutdown.recv() => {
                internal!(level = DEBUG, "Received shutdown signal");
                Err(SessionError::Shutdown)
            }
            read = timeout(wait, self.connection.read_line(limit, line)) => {
                Ok(read.map_err(|_| SessionError::Timeout(secs))??)
            }
        }
    }

    /// Returns `true` when the connection should close
    async fn handle(
        &mut self,
        command: Command,
        shutdown: &mut broadcast::Receiver<Signal>,
    ) -> Result<bool, SessionError> {
        let reply = match command {
            Command::Helo(HeloVariant::Ehlo(id)) => {
                self.transaction.reset();
                self.greeted = true;

                for line in [
                    format!("250-{} Hello {id}", self.banner),
                    format!("250-SIZE {MAX_MESSAGE_SIZE}"),
                    "250 8BITMIME".to_string(),
                ] {
                    outgoing!("{line}");
                    self.connection.send(&line).await?;
                }
                return Ok(false);
            }
            Command::Helo(HeloVariant::Helo(_)) => {
                self.transaction.reset();
                self.greeted = true;
                Reply::new(Status::Ok, self.banner.to_string())
            }
            Command::MailFrom(..) | Command::RcptTo(_) | Command::Data if !self.greeted => {
                Reply::enhanced(
                    Status::InvalidCommandSequence,
                    EnhancedCode::new(5, 5, 1),
                    "Error: send HELO/EHLO first",
                )
            }
            Command::MailFrom(_, params)
                if params.size().is_some_and(|size| size > MAX_MESSAGE_SIZE) =>
            {
                Reply::enhanced(
                    Status::ExceededStorage,
                    EnhancedCode::new(5, 3, 4),
                    "Error: message size exceeds fixed maximum message size",
                )
            }
            Command::MailFrom(sender, _) => self
                .transaction
                .accept_sender(sender.unwrap_or_default())
                .map_or_else(|err| err.reply(), |()| ok(0, "Ok")),
            Command::RcptTo(recipient) => self
                .transaction
                .accept_recipient(recipient)
                .map_or_else(|err| err.reply(), |()| ok(5, "Ok")),
            Command::Data => self.data(shutdown).await?,
            Command::Rset => {
                self.transaction.reset();
                Reply::enhanced(Status::Ok, EnhancedCode::new(2, 0, 0), "Ok")
            }
            Command::Noop => Reply::enhanced(Status::Ok, EnhancedCode::new(2, 0, 0), "Ok"),
            Command::Help => Reply::enhanced(
                Status::HelpMessage,
                EnhancedCode::new(2, 0, 0),
                "Commands: HELO EHLO MAIL RCPT DATA RSET NOOP HELP QUIT",
            ),
            Command::Quit => {
                self.reply(&Reply::enhanced(
                    Status::GoodBye,
                    EnhancedCode::new(2, 0, 0),
                    "Bye",
                ))
                .await?;
                return Ok(true);
            }
            Command::Unknown(_) => Reply::enhanced(
                Status::NotImplemented,
                EnhancedCode::new(5, 5, 2),
                "Error: command not recognized",
            ),
            Command::Invalid(reason) => Reply::enhanced(
                Status::ParameterSyntax,
                EnhancedCode::new(5, 5, 4),
                format!("Syntax error: {reason}"),
            ),
        };

        self.reply(&reply).await?;
        Ok(false)
    }

    /// DATA through to the final status line
    async fn data(
        &mut self,
        shutdown: &mut broadcast::Receiver<Signal>,
    ) -> Result<Reply, SessionError> {
        if let Err(err) = self.transaction.enter_data() {
            self.count_rejection(&err);
            if matches!(self.transaction.state(), State::Finalized(_)) {
                self.transaction.reset();
            }
            return Ok(err.reply());
        }

        self.reply(&Reply::new(
            Status::StartMailInput,
            "End data with <CR><LF>.<CR><LF>",
        ))
        .await?;

        let reply = match self.receive_data(shutdown).await? {
            Some(err) => {
                self.count_rejection(&err);
                err.reply()
            }
            None => match timeout(
                self.timeouts.data_termination(),
                self.transaction.finalize(&self.pipeline),
            )
            .await
            {
                Ok(Ok(outcome)) => outcome.reply(),
                Ok(Err(err)) => err.reply(),
                Err(_) => {
                    internal!(
                        level = WARN,
                        "Send did not complete within {}s",
                        self.timeouts.data_termination_secs
                    );
                    Reply::temporary_failure()
                }
            },
        };

        self.transaction.reset();
        Ok(reply)
    }

    /// Read message lines up to the terminating `.`, undoing dot-stuffing.
    ///
    /// After an overflow the remaining lines are read and dropped, so the
    /// rejection can be sent once the client has finished. That drain gets
    /// one data block timeout in total before the connection is dropped.
    async fn receive_data(
        &mut self,
        shutdown: &mut broadcast::Receiver<Signal>,
    ) -> Result<Option<TransactionError>, SessionError> {
        let mut at_line_start = true;
        let mut rejected = None;
        let idle_secs = self.timeouts.data_block_secs;
        let mut deadline = self.lifetime();
        let mut chunk = Vec::with_capacity(DATA_CHUNK);

        loop {
            chunk.clear();
            let read = self
                .next_line(shutdown, DATA_CHUNK, idle_secs, deadline, &mut chunk)
                .await?;

            if read == 0 {
                return Err(SessionError::Protocol(
                    "Connection closed during DATA".to_string(),
                ));
            }

            if at_line_start && (chunk == b".\r\n" || chunk == b".\n") {
                return Ok(rejected);
            }

            let payload = if at_line_start && chunk.starts_with(b"..") {
                &chunk[1..]
            } else {
                &chunk[..]
            };
            at_line_start = chunk.ends_with(b"\n");

            if rejected.is_none() {
                rejected = self.transaction.write_data(payload).err();

                if rejected.is_some()
                    && let Some(at) = Instant::now().checked_add(self.timeouts.data_block())
                {
                    deadline = deadline.earlier(Deadline {
                        at,
                        secs: idle_secs,
                    });
                }
            }
        }
    }

    fn count_rejection(&self, err: &TransactionError) {
        if let TransactionError::Validation(validation) = err {
            self.metrics
                .increment(Counter::SendFailure(validation.metric_label()));
        }
    }

    async fn reply(&mut self, reply: &Reply) -> Result<(), SessionError> {
        outgoing!("{reply}");
        self.connection.send(reply).await.map_err(|err| {
            internal!(level = ERROR, "{err}");
            SessionError::Protocol(format!("Failed to send response: {err}"))
        })
    }
}
