//! # Shared Store Implementations
//!
//! - `MemoryStore`: process-local, for tests and single-node servers
//! - `RedbStore`: persistent values on disk (redb + postcard), volatile
//!   values in memory

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;
