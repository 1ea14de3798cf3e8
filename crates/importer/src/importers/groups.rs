use async_trait::async_trait;
use chrono::Utc;
use temba_migrate_client::api_types::GroupPayload;
use temba_migrate_core::{EntityType, SYSTEM_GROUP_NAMES, SourceRecord};
use temba_migrate_storage::{DestinationRecord, GroupRow};

use super::{EntityImporter, ImportScope};
use crate::choices::{GROUP_STATUSES, code};
use crate::error::ImportError;

pub struct GroupImporter;

fn is_system_group(name: &str) -> bool {
    SYSTEM_GROUP_NAMES.iter().any(|system| system.eq_ignore_ascii_case(name.trim()))
}

#[async_trait]
impl EntityImporter for GroupImporter {
    fn entity(&self) -> EntityType {
        EntityType::Group
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::Group]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: GroupPayload = record.decode()?;
        // The destination creates its own system groups.
        if is_system_group(&payload.name) {
            tracing::debug!(group = %payload.name, "skipping system group");
            scope.skip(EntityType::Group);
            return Ok(());
        }

        let status = payload.status.as_deref().unwrap_or("ready");
        let row = GroupRow {
            uuid: payload.uuid,
            name: payload.name,
            query: payload.query.filter(|q| !q.trim().is_empty()),
            status: code(record, "status", GROUP_STATUSES, status)?,
            group_type: scope.ctx.group_type.clone(),
            created_on: Utc::now(),
        };
        scope.write(record.id(), DestinationRecord::Group(row)).await?;
        Ok(())
    }
}
