use async_trait::async_trait;
use chrono::Utc;
use temba_migrate_client::api_types::{CampaignEventPayload, CampaignPayload};
use temba_migrate_core::{EntityType, SourceId, SourceRecord};
use temba_migrate_storage::{CampaignEventRow, CampaignRow, DestinationRecord};

use super::{EntityImporter, ImportScope, ref_id};
use crate::choices::{CAMPAIGN_UNITS, code};
use crate::error::ImportError;

pub struct CampaignImporter;

#[async_trait]
impl EntityImporter for CampaignImporter {
    fn entity(&self) -> EntityType {
        EntityType::Campaign
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::Campaign]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[EntityType::Group]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: CampaignPayload = record.decode()?;
        let group_id = scope.remap.get(EntityType::Group, &ref_id(&payload.group))?;
        let created_on = payload.created_on.unwrap_or_else(Utc::now);
        let row = CampaignRow {
            uuid: payload.uuid,
            name: payload.name,
            group_id,
            is_archived: payload.archived,
            created_on,
            modified_on: created_on,
        };
        scope.write(record.id(), DestinationRecord::Campaign(row)).await?;
        Ok(())
    }
}

pub struct CampaignEventImporter;

#[async_trait]
impl EntityImporter for CampaignEventImporter {
    fn entity(&self) -> EntityType {
        EntityType::CampaignEvent
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::CampaignEvent]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[EntityType::Campaign, EntityType::Field, EntityType::Flow]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: CampaignEventPayload = record.decode()?;
        let campaign_id = scope.remap.get(EntityType::Campaign, &ref_id(&payload.campaign))?;
        let relative_to_id =
            scope.remap.get(EntityType::Field, &SourceId::new(payload.relative_to.key.clone()))?;
        let flow_id = payload
            .flow
            .as_ref()
            .and_then(|flow| scope.remap.get_optional(EntityType::Flow, &ref_id(flow)));

        let offset = i32::try_from(payload.offset)
            .map_err(|_| record.invalid(format!("offset {} out of range", payload.offset)))?;
        let delivery_hour = i32::try_from(payload.delivery_hour)
            .map_err(|_| record.invalid(format!("delivery hour {} out of range", payload.delivery_hour)))?;
        let created_on = payload.created_on.unwrap_or_else(Utc::now);
        let row = CampaignEventRow {
            uuid: payload.uuid.clone(),
            campaign_id,
            relative_to_id,
            offset,
            unit: code(record, "unit", CAMPAIGN_UNITS, &payload.unit)?,
            delivery_hour,
            event_type: if payload.flow.is_some() { "F" } else { "M" }.to_owned(),
            flow_id,
            message: payload.message.filter(|m| !m.is_null()),
            created_on,
            modified_on: created_on,
        };
        scope.write(record.id(), DestinationRecord::CampaignEvent(row)).await?;
        Ok(())
    }
}
