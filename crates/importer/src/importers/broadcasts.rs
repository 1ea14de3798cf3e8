use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use temba_migrate_client::api_types::BroadcastPayload;
use temba_migrate_core::{EntityType, SourceId, SourceRecord};
use temba_migrate_storage::{BroadcastRow, DestinationRecord};

use super::{EntityImporter, ImportScope, ref_ids};
use crate::choices::{MSG_STATUSES, code, parse_urn};
use crate::error::ImportError;

pub struct BroadcastImporter;

#[async_trait]
impl EntityImporter for BroadcastImporter {
    fn entity(&self) -> EntityType {
        EntityType::Broadcast
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::Broadcast]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[EntityType::Group, EntityType::Contact, EntityType::ContactUrn]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: BroadcastPayload = record.decode()?;
        let group_ids = scope.remap.get_all(EntityType::Group, &ref_ids(&payload.groups))?;
        let contact_ids = scope.remap.get_all(EntityType::Contact, &ref_ids(&payload.contacts))?;
        let urn_ids: Vec<i64> = payload
            .urns
            .iter()
            .filter_map(|urn| parse_urn(urn))
            .filter_map(|urn| {
                scope.remap.get_optional(EntityType::ContactUrn, &SourceId::new(urn.identity))
            })
            .collect();

        let status = payload.status.as_deref().unwrap_or("sent");
        let created_on = payload.created_on.unwrap_or_else(Utc::now);
        let row = BroadcastRow {
            uuid: scope.ctx.natural_uuid(EntityType::Broadcast, record.id()),
            text: match payload.text {
                Value::Null => json!({}),
                text => text,
            },
            status: code(record, "status", MSG_STATUSES, status)?,
            group_ids,
            contact_ids,
            urn_ids,
            created_on,
            modified_on: created_on,
        };
        scope.write(record.id(), DestinationRecord::Broadcast(row)).await?;
        Ok(())
    }
}
