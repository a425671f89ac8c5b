pub mod access;
pub mod config;
pub mod error;
pub mod logging;
pub mod record;
pub mod status;

pub use tracing;
