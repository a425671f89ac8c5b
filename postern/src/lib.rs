pub mod controller;
#[cfg(unix)]
pub mod socket;

pub use controller::{ConfigError, Postern, ServeError};
