use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use temba_migrate_client::api_types::FlowStartPayload;
use temba_migrate_core::{EntityType, SourceRecord};
use temba_migrate_storage::{DestinationRecord, FlowStartRow};

use super::{EntityImporter, ImportScope, ref_id, ref_ids};
use crate::choices::{FLOW_START_STATUSES, code};
use crate::error::ImportError;

pub struct FlowStartImporter;

#[async_trait]
impl EntityImporter for FlowStartImporter {
    fn entity(&self) -> EntityType {
        EntityType::FlowStart
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::FlowStart]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[EntityType::Flow, EntityType::Group, EntityType::Contact]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: FlowStartPayload = record.decode()?;
        let flow_id = scope.remap.get(EntityType::Flow, &ref_id(&payload.flow))?;
        let group_ids = scope.remap.get_all(EntityType::Group, &ref_ids(&payload.groups))?;
        let contact_ids = scope.remap.get_all(EntityType::Contact, &ref_ids(&payload.contacts))?;

        let status = payload.status.as_deref().unwrap_or("complete");
        let created_on = payload.created_on.unwrap_or_else(Utc::now);
        let row = FlowStartRow {
            uuid: payload.uuid.clone(),
            flow_id,
            status: code(record, "status", FLOW_START_STATUSES, status)?,
            restart_participants: payload.restart_participants,
            include_active: !payload.exclude_active,
            extra: payload.extra.or(payload.params).unwrap_or_else(|| json!({})),
            group_ids,
            contact_ids,
            created_on,
            modified_on: payload.modified_on.unwrap_or(created_on),
        };
        scope.write(record.id(), DestinationRecord::FlowStart(row)).await?;
        Ok(())
    }
}
