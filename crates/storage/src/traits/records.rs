use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{DestinationRecord, Upserted, WriteScope};

/// Idempotent writes of imported rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert the row, or update the existing row with the same natural key.
    ///
    /// Fails with [`StorageError::ForeignKey`] when a referenced row is missing.
    async fn upsert(
        &self,
        scope: WriteScope,
        record: &DestinationRecord,
    ) -> Result<Upserted, StorageError>;
}
