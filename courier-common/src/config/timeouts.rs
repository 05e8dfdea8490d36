//! Server-side SMTP timeouts.
//!
//! Values follow the RFC 5321 recommendations for servers receiving mail:
//!
//! - MAIL/RCPT and other commands: 5 minutes
//! - DATA block: 3 minutes
//! - DATA termination: 10 minutes
//! - Overall connection: 30 minutes

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTimeouts {
    /// Timeout for SMTP commands (HELO, EHLO, MAIL FROM, RCPT TO, etc.)
    #[serde(default = "defaults::command_secs")]
    pub command_secs: u64,

    /// Timeout for receiving each block of message data.
    #[serde(default = "defaults::data_block_secs")]
    pub data_block_secs: u64,

    /// Timeout for the reply to the final dot, covering the backend call.
    #[serde(default = "defaults::data_termination_secs")]
    pub data_termination_secs: u64,

    /// Maximum total connection duration.
    #[serde(default = "defaults::connection_secs")]
    pub connection_secs: u64,
}

impl Default for ServerTimeouts {
    fn default() -> Self {
        Self {
            command_secs: defaults::command_secs(),
            data_block_secs: defaults::data_block_secs(),
            data_termination_secs: defaults::data_termination_secs(),
            connection_secs: defaults::connection_secs(),
        }
    }
}

impl ServerTimeouts {
    pub const fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    pub const fn data_block(&self) -> Duration {
        Duration::from_secs(self.data_block_secs)
    }

    pub const fn data_termination(&self) -> Duration {
        Duration::from_secs(self.data_termination_secs)
    }

    pub const fn connection(&self) -> Duration {
        Duration::from_secs(self.connection_secs)
    }
}

mod defaults {
    pub const fn command_secs() -> u64 {
        300
    }

    pub const fn data_block_secs() -> u64 {
        180
    }

    pub const fn data_termination_secs() -> u64 {
        600
    }

    pub const fn connection_secs() -> u64 {
        1800
    }
}
