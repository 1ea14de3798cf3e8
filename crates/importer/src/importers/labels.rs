use async_trait::async_trait;
use chrono::Utc;
use temba_migrate_client::api_types::LabelPayload;
use temba_migrate_core::{EntityType, SourceRecord};
use temba_migrate_storage::{DestinationRecord, LabelRow};

use super::{EntityImporter, ImportScope};
use crate::error::ImportError;

pub struct LabelImporter;

#[async_trait]
impl EntityImporter for LabelImporter {
    fn entity(&self) -> EntityType {
        EntityType::Label
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::Label]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: LabelPayload = record.decode()?;
        let row = LabelRow { uuid: payload.uuid, name: payload.name, created_on: Utc::now() };
        scope.write(record.id(), DestinationRecord::Label(row)).await?;
        Ok(())
    }
}
