//! SMTP front end of the courier relay
//!
//! [`Listener`] accepts connections and runs one [`Session`] per connection.
//! A session parses commands ([`command`]) and drives a [`Transaction`]
//! through `Idle -> HasSender -> HasRecipients -> DataPhase -> Finalized`,
//! handing each completed envelope to the send pipeline exactly once.

pub mod command;
mod connection;
mod listener;
mod session;
pub mod transaction;

pub use listener::Listener;
pub use session::{Session, SessionConfig};
pub use transaction::{Finalized, MAX_MESSAGE_SIZE, State, Transaction, TransactionError};
