//! Deadlines applied to every network read and write of a session.
//!
//! A session never blocks on the peer without a deadline: command lines and
//! DATA lines each have their own read deadline, and the best-effort `421`
//! sent before a fatal close uses a much shorter write deadline so a stalled
//! peer cannot hold the process open.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-session timeout configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTimeouts {
    /// Deadline for reading a command line, and for writing ordinary replies.
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::command_secs")]
    pub command_secs: u64,

    /// Deadline for reading each line of message content.
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::data_secs")]
    pub data_secs: u64,

    /// Deadline for writing the `421` reply sent before a fatal close.
    ///
    /// Default: 5 seconds
    #[serde(default = "defaults::fatal_reply_secs")]
    pub fatal_reply_secs: u64,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            command_secs: defaults::command_secs(),
            data_secs: defaults::data_secs(),
            fatal_reply_secs: defaults::fatal_reply_secs(),
        }
    }
}

impl SessionTimeouts {
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    #[must_use]
    pub const fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_secs)
    }

    #[must_use]
    pub const fn fatal_reply_timeout(&self) -> Duration {
        Duration::from_secs(self.fatal_reply_secs)
    }
}

mod defaults {
    pub const fn command_secs() -> u64 {
        60
    }

    pub const fn data_secs() -> u64 {
        60
    }

    pub const fn fatal_reply_secs() -> u64 {
        5
    }
}
