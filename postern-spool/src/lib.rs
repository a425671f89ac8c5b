pub mod backends;
pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use backends::MemorySpool;
pub use config::SpoolConfig;
pub use error::{Result, SpoolError, ValidationError};
pub use store::{FileSpool, MessageStore, PATCH_SIZE, SENTINEL};
pub use types::MessageId;
