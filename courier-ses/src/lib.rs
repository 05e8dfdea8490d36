//! The send pipeline: one backend call per completed envelope
//!
//! [`SendPipeline`] resolves the current backend through a
//! [`ClientHandle`](courier_credentials::ClientHandle), issues exactly one
//! send, updates the counters and maps the result to a [`SendOutcome`].
//! There is no retry here; a failure is reported to the client as a
//! temporary status so the client retries.

mod backend;
mod error;
mod pipeline;
mod ses;

pub use backend::MailBackend;
pub use error::BackendError;
pub use pipeline::{FailureReason, SendOutcome, SendPipeline};
pub use ses::{SesBackend, SesClientFactory};
