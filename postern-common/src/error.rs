//! Error types shared by the postern crates.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that can occur while installing the diagnostic logger.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The configured log file could not be opened for appending.
    #[error("Unable to open log file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A global subscriber was already installed.
    #[error("Unable to install logger: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}
