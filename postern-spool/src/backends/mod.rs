pub mod memory;

pub use memory::{MemorySpool, StoredMessage};
