//! Error types shared across the courier crates.
//!
//! Per-session errors ([`SessionError`], [`ValidationError`]) never leave the
//! connection that produced them. [`ConfigError`] is raised at startup only.

use std::io;

use thiserror::Error;

/// Domain checks applied to an envelope on top of protocol parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// DATA was requested before any recipient was accepted.
    #[error("no valid recipients")]
    NoRecipients,

    /// The cumulative message size went over the ceiling.
    #[error("message size {size} exceeds limit of {limit}")]
    MessageTooLarge { size: usize, limit: usize },
}

impl ValidationError {
    /// Label used for the typed failure counter
    #[must_use]
    pub const fn metric_label(&self) -> &'static str {
        match self {
            Self::NoRecipients => "no valid recipients",
            Self::MessageTooLarge { .. } => "minimum message size exceed",
        }
    }
}

/// Errors that can occur during session handling.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Protocol error occurred during session.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection error occurred.
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// Shutdown signal received.
    #[error("Shutdown requested")]
    Shutdown,

    /// Session timed out.
    #[error("Session timed out after {0} seconds")]
    Timeout(u64),
}

impl SessionError {
    /// Returns `true` if the error indicates a graceful shutdown.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    /// Returns `true` if the error is a client-side issue.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Timeout(_))
    }
}

/// Invalid or incomplete configuration, fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required configuration field is missing.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A configuration value is invalid.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
