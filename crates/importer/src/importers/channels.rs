use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use temba_migrate_client::api_types::{ChannelEventPayload, ChannelPayload};
use temba_migrate_core::{EntityType, SourceRecord};
use temba_migrate_storage::{ChannelEventRow, ChannelRow, DestinationRecord};

use super::{EntityImporter, ImportScope, ref_id};
use crate::error::ImportError;

/// Channels get the configured channel type and an empty config: the source
/// API exposes neither.
pub struct ChannelImporter;

#[async_trait]
impl EntityImporter for ChannelImporter {
    fn entity(&self) -> EntityType {
        EntityType::Channel
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::Channel]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: ChannelPayload = record.decode()?;
        let device = payload
            .device
            .as_ref()
            .and_then(|d| d.get("name"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        let created_on = payload.created_on.unwrap_or_else(Utc::now);
        let row = ChannelRow {
            uuid: payload.uuid,
            name: payload.name,
            address: payload.address,
            country: payload.country,
            channel_type: scope.ctx.channel_type.clone(),
            device,
            config: json!({}),
            last_seen: payload.last_seen,
            created_on,
            modified_on: created_on,
        };
        scope.write(record.id(), DestinationRecord::Channel(row)).await?;
        Ok(())
    }
}

pub struct ChannelEventImporter;

#[async_trait]
impl EntityImporter for ChannelEventImporter {
    fn entity(&self) -> EntityType {
        EntityType::ChannelEvent
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::ChannelEvent]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[EntityType::Channel, EntityType::Contact]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: ChannelEventPayload = record.decode()?;
        let channel = payload.channel.as_ref().ok_or_else(|| record.invalid("missing channel"))?;
        let channel_id = scope.remap.get(EntityType::Channel, &ref_id(channel))?;
        let contact_id = payload
            .contact
            .as_ref()
            .and_then(|contact| scope.remap.get_optional(EntityType::Contact, &ref_id(contact)));

        let created_on = payload.created_on.unwrap_or_else(Utc::now);
        let row = ChannelEventRow {
            uuid: scope.ctx.natural_uuid(EntityType::ChannelEvent, record.id()),
            event_type: payload.event_type,
            channel_id,
            contact_id,
            extra: payload.extra.unwrap_or_else(|| json!({})),
            occurred_on: payload.occurred_on.unwrap_or(created_on),
            created_on,
        };
        scope.write(record.id(), DestinationRecord::ChannelEvent(row)).await?;
        Ok(())
    }
}
