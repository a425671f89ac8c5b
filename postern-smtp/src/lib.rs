pub mod command;
pub mod connection;
pub mod error;
pub mod session;
pub mod state;

pub use session::{Session, SessionConfig};
pub use state::State;

/// Longest command line accepted, terminator included.
pub const MAX_COMMAND_LINE: usize = 512;

/// Longest message content line accepted, terminator included.
pub const MAX_DATA_LINE: usize = 1000;
