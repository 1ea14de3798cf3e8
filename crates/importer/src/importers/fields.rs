use async_trait::async_trait;
use chrono::Utc;
use temba_migrate_client::api_types::FieldPayload;
use temba_migrate_core::{EntityType, SourceRecord};
use temba_migrate_storage::{DestinationRecord, FieldRow};

use super::{EntityImporter, FieldInfo, ImportScope};
use crate::choices::{FIELD_VALUE_TYPES, code};
use crate::error::ImportError;

pub struct FieldImporter;

#[async_trait]
impl EntityImporter for FieldImporter {
    fn entity(&self) -> EntityType {
        EntityType::Field
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::Field]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: FieldPayload = record.decode()?;
        let value_type = payload.value_type().ok_or_else(|| record.invalid("missing value type"))?;
        let row = FieldRow {
            uuid: scope.ctx.natural_uuid(EntityType::Field, record.id()),
            key: payload.key.clone(),
            name: payload.display_name().to_owned(),
            value_type: code(record, "value type", FIELD_VALUE_TYPES, value_type)?,
            show_in_table: payload.show_in_table(),
            created_on: Utc::now(),
        };
        let info = FieldInfo { uuid: row.uuid.clone(), value_type: row.value_type.clone() };
        scope.write(record.id(), DestinationRecord::Field(row)).await?;
        scope.fields.insert(payload.key, info);
        Ok(())
    }
}
