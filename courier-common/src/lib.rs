pub mod config;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod status;

pub use envelope::Envelope;
pub use tracing;

/// Process-wide lifecycle signal broadcast to listeners and sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
