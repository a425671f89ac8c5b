//! Error types for the postern-spool crate.
//!
//! None of these are ever shown to an SMTP client; the session maps every
//! variant to a generic storage reply.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::MessageId;

/// Top-level spool error type.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// I/O operation failed (create, write, flush, sync, seek).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Every letter `'a'..='z'` is already taken for this second.
    #[error("No unique spool name available for timestamp {timestamp:08x}")]
    Exhausted { timestamp: u64 },

    /// A line was stored or a commit attempted with no open message.
    #[error("No message is open")]
    NotOpen,

    /// A message was opened while another is still open.
    #[error("Message {0} is still open")]
    AlreadyOpen(MessageId),

    /// The first stored line is too short to carry the in-progress marker.
    #[error("First line of a message must be at least {required} bytes, got {len}")]
    FirstLineTooShort { len: usize, required: usize },

    /// Commit was attempted before any line was stored.
    #[error("Message {0} has no content")]
    NothingStored(MessageId),

    /// Spool directory validation failed.
    #[error("Spool validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A failure injected by an in-memory spool.
    #[error("Injected failure: {0}")]
    Injected(&'static str),
}

/// Spool configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Spool path cannot contain '..' components: {}", .0.display())]
    ParentDirectory(PathBuf),

    #[error("Spool path must be absolute: {}", .0.display())]
    NotAbsolute(PathBuf),

    #[error("Spool path cannot be in system directory {prefix}: {}", path.display())]
    SystemDirectory { prefix: &'static str, path: PathBuf },

    #[error("Expected {} to be a directory, but it is not", .0.display())]
    NotDirectory(PathBuf),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// Specialized `Result` type for spool operations.
pub type Result<T> = std::result::Result<T, SpoolError>;
