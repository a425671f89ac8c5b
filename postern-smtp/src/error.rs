//! Error types for the postern-smtp crate.
//!
//! Transport failures are always fatal to a session; storage failures never
//! surface here because the session answers them with a `452` and carries on.

use std::io;

use thiserror::Error;

/// Errors that can occur during connection operations.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// I/O error during connection operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection was closed by peer.
    #[error("Connection closed by peer")]
    Closed,

    /// The operation did not complete before its deadline.
    #[error("Deadline expired")]
    Timeout,

    /// Formatting error while preparing response.
    #[error("Response formatting error: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Specialized `Result` type for connection operations.
pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

/// Reasons a session ends other than QUIT.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No complete line arrived before the read deadline.
    #[error("network read timeout")]
    ReadTimeout,

    /// Reading from the peer failed, or the peer went away.
    #[error("network read error: {0}")]
    Read(#[source] ConnectionError),

    /// A reply could not be delivered.
    #[error("network write error: {0}")]
    Write(#[source] ConnectionError),

    /// Session state contradicted itself.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl SessionError {
    /// Classify a failed read.
    #[must_use]
    pub fn from_read(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Timeout => Self::ReadTimeout,
            err => Self::Read(err),
        }
    }

    /// Whether the peer should be sent a closing `421`.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}
