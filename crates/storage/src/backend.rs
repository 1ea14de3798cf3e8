//! Unified storage backend with enum dispatch.

use async_trait::async_trait;
use temba_migrate_core::EntityType;

use crate::error::StorageError;
use crate::memory::MemoryStore;
use crate::pg_storage::PgStore;
use crate::traits::{AttachmentStore, BoundaryStore, ContextStore, RecordStore};
use crate::types::{
    AttachmentRow, BoundaryRow, DestinationRecord, OrgSettings, Upserted, WriteScope,
};

macro_rules! dispatch {
    ($self:expr, $trait:path, $method:ident ( $($arg:expr),* $(,)? )) => {
        match $self {
            StorageBackend::Postgres(s) => <PgStore as $trait>::$method(s, $($arg),*).await,
            StorageBackend::Memory(s) => <MemoryStore as $trait>::$method(s, $($arg),*).await,
        }
    };
}

#[derive(Clone, Debug)]
pub enum StorageBackend {
    Postgres(PgStore),
    Memory(MemoryStore),
}

impl StorageBackend {
    pub async fn new_postgres(database_url: &str) -> Result<Self, StorageError> {
        Ok(Self::Postgres(PgStore::new(database_url).await?))
    }

    /// In-memory destination with one organization and one admin.
    #[must_use]
    pub fn new_memory() -> Self {
        Self::Memory(MemoryStore::seeded())
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

// ── ContextStore ─────────────────────────────────────────────────

#[async_trait]
impl ContextStore for StorageBackend {
    async fn load_context(&self) -> Result<WriteScope, StorageError> {
        dispatch!(self, ContextStore, load_context())
    }

    async fn system_fields(&self, org_id: i64) -> Result<Vec<(String, i64)>, StorageError> {
        dispatch!(self, ContextStore, system_fields(org_id))
    }

    async fn update_org(&self, org_id: i64, settings: &OrgSettings) -> Result<(), StorageError> {
        dispatch!(self, ContextStore, update_org(org_id, settings))
    }

    async fn flush(&self, keep: WriteScope) -> Result<u64, StorageError> {
        dispatch!(self, ContextStore, flush(keep))
    }

    async fn count(&self, entity: EntityType) -> Result<u64, StorageError> {
        dispatch!(self, ContextStore, count(entity))
    }
}

// ── RecordStore ──────────────────────────────────────────────────

#[async_trait]
impl RecordStore for StorageBackend {
    async fn upsert(
        &self,
        scope: WriteScope,
        record: &DestinationRecord,
    ) -> Result<Upserted, StorageError> {
        dispatch!(self, RecordStore, upsert(scope, record))
    }
}

// ── AttachmentStore ──────────────────────────────────────────────

#[async_trait]
impl AttachmentStore for StorageBackend {
    async fn attachment_batch(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<AttachmentRow>, StorageError> {
        dispatch!(self, AttachmentStore, attachment_batch(after_id, limit))
    }

    async fn set_attachments(
        &self,
        msg_id: i64,
        attachments: &[String],
    ) -> Result<(), StorageError> {
        dispatch!(self, AttachmentStore, set_attachments(msg_id, attachments))
    }
}

// ── BoundaryStore ────────────────────────────────────────────────

#[async_trait]
impl BoundaryStore for StorageBackend {
    async fn upsert_boundary(&self, boundary: &BoundaryRow) -> Result<Upserted, StorageError> {
        dispatch!(self, BoundaryStore, upsert_boundary(boundary))
    }
}
