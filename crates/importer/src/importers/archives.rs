use async_trait::async_trait;
use chrono::Utc;
use temba_migrate_client::api_types::ArchivePayload;
use temba_migrate_core::{EntityType, SourceRecord};
use temba_migrate_storage::{ArchiveRow, DestinationRecord};

use super::{EntityImporter, ImportScope};
use crate::choices::{ARCHIVE_PERIODS, code};
use crate::error::ImportError;

/// Archive rows only: the archive files stay where the source stored them.
pub struct ArchiveImporter;

#[async_trait]
impl EntityImporter for ArchiveImporter {
    fn entity(&self) -> EntityType {
        EntityType::Archive
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::Archive]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: ArchivePayload = record.decode()?;
        // Download URLs carry signed, expiring query parameters.
        let url = payload.url.split_once('?').map_or(payload.url.as_str(), |(url, _)| url);
        let row = ArchiveRow {
            hash: payload.hash.clone(),
            archive_type: payload.archive_type.clone(),
            start_date: payload.start_date,
            period: code(record, "period", ARCHIVE_PERIODS, &payload.period)?,
            record_count: payload.record_count,
            size: payload.size,
            url: url.to_owned(),
            created_on: Utc::now(),
        };
        scope.write(record.id(), DestinationRecord::Archive(row)).await?;
        Ok(())
    }
}
