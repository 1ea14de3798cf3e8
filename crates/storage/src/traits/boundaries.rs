use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{BoundaryRow, Upserted};

/// Administrative boundary writes.
#[async_trait]
pub trait BoundaryStore: Send + Sync {
    /// Upsert by OSM id. The parent boundary must already exist.
    async fn upsert_boundary(&self, boundary: &BoundaryRow) -> Result<Upserted, StorageError>;
}
