//! Per-connection relay state machine
//!
//! ```text
//! Idle -> HasSender -> HasRecipients -> DataPhase -> Finalized{Sent|Rejected}
//! ```
//!
//! [`Transaction::reset`] returns to `Idle` from any state. [`Transaction::close`]
//! is terminal and idempotent.

use courier_common::{Envelope, error::ValidationError, internal, status::Reply};
use courier_ses::{MailBackend, SendOutcome, SendPipeline};
use thiserror::Error;

/// Largest message accepted, in bytes
pub const MAX_MESSAGE_SIZE: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalized {
    Sent,
    Rejected,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum State {
    #[default]
    Idle,
    HasSender,
    HasRecipients,
    DataPhase,
    Finalized(Finalized),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{operation} is not valid in state {state:?}")]
    OutOfSequence {
        operation: &'static str,
        state: State,
    },

    #[error("Transaction is closed")]
    Closed,
}

impl TransactionError {
    /// The status line reported for this error
    pub fn reply(&self) -> Reply {
        use courier_common::status::{EnhancedCode, Status};

        match self {
            Self::Validation(ValidationError::NoRecipients) => Reply::no_valid_recipients(),
            Self::Validation(ValidationError::MessageTooLarge { .. }) => {
                Reply::message_too_large()
            }
            Self::OutOfSequence { .. } => Reply::enhanced(
                Status::InvalidCommandSequence,
                EnhancedCode::new(5, 5, 1),
                "Error: bad sequence of commands",
            ),
            Self::Closed => Reply::enhanced(
                Status::Unavailable,
                EnhancedCode::new(4, 3, 0),
                "Error: session closed",
            ),
        }
    }
}

/// Sender, recipients and message bytes of the transaction in progress
#[derive(Debug, Default)]
pub struct Transaction {
    state: State,
    sender: Option<String>,
    recipients: Vec<String>,
    buffer: Vec<u8>,
    configuration_set: Option<String>,
}

impl Transaction {
    pub const fn new(configuration_set: Option<String>) -> Self {
        Self {
            state: State::Idle,
            sender: None,
            recipients: Vec::new(),
            buffer: Vec::new(),
            configuration_set,
        }
    }

    pub const fn state(&self) -> State {
        self.state
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Bytes buffered so far
    pub const fn size(&self) -> usize {
        self.buffer.len()
    }

    const fn out_of_sequence(&self, operation: &'static str) -> TransactionError {
        match self.state {
            State::Closed => TransactionError::Closed,
            state => TransactionError::OutOfSequence { operation, state },
        }
    }

    /// Record the sender. Address syntax has already been checked by the
    /// command parser.
    pub fn accept_sender(&mut self, sender: impl Into<String>) -> Result<(), TransactionError> {
        if self.state != State::Idle {
            return Err(self.out_of_sequence("MAIL"));
        }

        self.sender = Some(sender.into());
        self.state = State::HasSender;
        Ok(())
    }

    /// Append a recipient, keeping order and duplicates
    pub fn accept_recipient(
        &mut self,
        recipient: impl Into<String>,
    ) -> Result<(), TransactionError> {
        if !matches!(self.state, State::HasSender | State::HasRecipients) {
            return Err(self.out_of_sequence("RCPT"));
        }

        self.recipients.push(recipient.into());
        self.state = State::HasRecipients;
        Ok(())
    }

    /// Move into the data phase. A transaction with a sender but no
    /// recipients is rejected permanently here.
    pub fn enter_data(&mut self) -> Result<(), TransactionError> {
        match self.state {
            State::HasRecipients => {
                self.state = State::DataPhase;
                Ok(())
            }
            State::HasSender => {
                self.state = State::Finalized(Finalized::Rejected);
                Err(ValidationError::NoRecipients.into())
            }
            _ => Err(self.out_of_sequence("DATA")),
        }
    }

    /// Buffer one chunk of message data.
    ///
    /// The ceiling is checked before the chunk is appended. Once it is
    /// exceeded the buffer is released, the transaction is rejected and no
    /// further chunks are accepted.
    pub fn write_data(&mut self, chunk: &[u8]) -> Result<(), TransactionError> {
        if self.state != State::DataPhase {
            return Err(self.out_of_sequence("write"));
        }

        let size = self.buffer.len().saturating_add(chunk.len());
        if size > MAX_MESSAGE_SIZE {
            internal!(
                level = WARN,
                "message size {size} exceeds SES limit of {MAX_MESSAGE_SIZE}"
            );

            self.buffer = Vec::new();
            self.state = State::Finalized(Finalized::Rejected);
            return Err(ValidationError::MessageTooLarge {
                size,
                limit: MAX_MESSAGE_SIZE,
            }
            .into());
        }

        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    /// Hand the completed envelope to the send pipeline, exactly once.
    pub async fn finalize<B: MailBackend>(
        &mut self,
        pipeline: &SendPipeline<B>,
    ) -> Result<SendOutcome, TransactionError> {
        if self.state != State::DataPhase {
            return Err(self.out_of_sequence("finalize"));
        }

        let envelope = Envelope::new(
            self.sender.take().unwrap_or_default(),
            std::mem::take(&mut self.recipients),
            std::mem::take(&mut self.buffer),
            self.configuration_set.clone(),
        );

        // Mark as rejected first so a cancelled send is never retried
        self.state = State::Finalized(Finalized::Rejected);

        let outcome = pipeline.send(&envelope).await;
        if outcome == SendOutcome::Sent {
            self.state = State::Finalized(Finalized::Sent);
        }

        Ok(outcome)
    }

    /// Discard sender, recipients and buffer and return to `Idle`
    pub fn reset(&mut self) {
        if self.state == State::Closed {
            return;
        }

        self.sender = None;
        self.recipients.clear();
        self.buffer = Vec::new();
        self.state = State::Idle;
    }

    /// Terminal; calling it again has no further effect
    pub fn close(&mut self) {
        self.sender = None;
        self.recipients = Vec::new();
        self.buffer = Vec::new();
        self.state = State::Closed;
    }
}
