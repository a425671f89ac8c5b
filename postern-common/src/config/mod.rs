pub mod logging;
pub mod timeouts;

pub use logging::LoggingConfig;
pub use timeouts::SessionTimeouts;
