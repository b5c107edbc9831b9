//! # roils-store
//!
//! Record store adapters for the ROILS pipeline.
//!
//! - [`RedisRecordStore`]: one Redis hash per incident, iterated with `SCAN`
//! - [`MemoryRecordStore`]: ordered in-process store for tests and dry runs

pub mod memory;
pub mod redis_store;

pub use memory::MemoryRecordStore;
pub use redis_store::RedisRecordStore;

// Re-export core types
pub use roils_core::*;
