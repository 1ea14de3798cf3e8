use async_trait::async_trait;
use temba_migrate_core::EntityType;

use crate::error::StorageError;
use crate::types::{OrgSettings, WriteScope};

/// Destination organization, admin user and bulk maintenance.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Resolve the pre-created organization and its admin user.
    ///
    /// Fails with [`StorageError::MissingContext`] when either is absent.
    async fn load_context(&self) -> Result<WriteScope, StorageError>;

    /// Destination ids of the organization's system contact fields, keyed by
    /// field key.
    async fn system_fields(&self, org_id: i64) -> Result<Vec<(String, i64)>, StorageError>;

    /// Copy source organization settings onto the destination organization.
    async fn update_org(&self, org_id: i64, settings: &OrgSettings) -> Result<(), StorageError>;

    /// Delete every imported row plus every organization and user outside
    /// `keep`. Admin boundaries survive. Returns the number of rows removed.
    async fn flush(&self, keep: WriteScope) -> Result<u64, StorageError>;

    /// Number of destination rows of the given type.
    async fn count(&self, entity: EntityType) -> Result<u64, StorageError>;
}
