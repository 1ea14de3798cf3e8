//! Destination storage for temba-migrate
//!
//! PostgreSQL backend writing into the destination instance's tables, plus
//! an in-memory backend with the same contract for dry runs and tests.

pub mod backend;
pub mod error;
mod memory;
pub mod pg_storage;
#[cfg(test)]
mod tests;
pub mod traits;
pub mod types;

pub use backend::StorageBackend;
pub use error::StorageError;
pub use memory::{MemoryStore, StoredOrg};
pub use pg_storage::PgStore;
pub use types::*;
