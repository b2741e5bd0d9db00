// lib/src/storage_engine/mod.rs

pub mod inmemory_storage;
pub mod storage_engine;
#[cfg(feature = "with-sled")]
pub mod sled_storage;

pub use inmemory_storage::InMemoryStorage;
pub use storage_engine::{Collection, StorageEngine, UniqueIndex};
#[cfg(feature = "with-sled")]
pub use sled_storage::SledStorage;
