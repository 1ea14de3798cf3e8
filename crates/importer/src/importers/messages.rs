use async_trait::async_trait;
use chrono::Utc;
use temba_migrate_client::api_types::MessagePayload;
use temba_migrate_core::{EntityType, SourceId, SourceRecord};
use temba_migrate_storage::{DestinationRecord, MessageRow};

use super::{EntityImporter, ImportScope, ref_id, ref_ids};
use crate::choices::{MSG_DIRECTIONS, MSG_STATUSES, MSG_TYPES, MSG_VISIBILITIES, code, parse_urn};
use crate::error::ImportError;
use crate::stats::Outcome;

/// Messages together with their attachments, which the source embeds in
/// the message payload. Attachments are stored as `content_type:url`.
pub struct MessageImporter;

#[async_trait]
impl EntityImporter for MessageImporter {
    fn entity(&self) -> EntityType {
        EntityType::Message
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::Message, EntityType::Attachment]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[
            EntityType::Contact,
            EntityType::ContactUrn,
            EntityType::Channel,
            EntityType::Broadcast,
            EntityType::Label,
        ]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: MessagePayload = record.decode()?;
        let contact = payload.contact.as_ref().ok_or_else(|| record.invalid("missing contact"))?;
        let contact_id = scope.remap.get(EntityType::Contact, &ref_id(contact))?;
        let contact_urn_id = payload
            .urn
            .as_deref()
            .and_then(parse_urn)
            .and_then(|urn| scope.remap.get_optional(EntityType::ContactUrn, &SourceId::new(urn.identity)));
        let channel_id = payload
            .channel
            .as_ref()
            .and_then(|channel| scope.remap.get_optional(EntityType::Channel, &ref_id(channel)));
        let broadcast_id = payload
            .broadcast
            .and_then(|id| scope.remap.get_optional(EntityType::Broadcast, &SourceId::from(id)));
        let label_ids = scope.remap.get_all(EntityType::Label, &ref_ids(&payload.labels))?;

        let attachments: Vec<String> = payload
            .attachments
            .iter()
            .map(|a| format!("{}:{}", a.content_type, a.url))
            .collect();
        let attachment_count = attachments.len();

        let created_on = payload.created_on.unwrap_or_else(Utc::now);
        let row = MessageRow {
            uuid: scope.ctx.natural_uuid(EntityType::Message, record.id()),
            contact_id,
            contact_urn_id,
            channel_id,
            broadcast_id,
            direction: code(record, "direction", MSG_DIRECTIONS, &payload.direction)?,
            msg_type: code(record, "type", MSG_TYPES, payload.msg_type.as_deref().unwrap_or("text"))?,
            status: code(record, "status", MSG_STATUSES, &payload.status)?,
            visibility: code(
                record,
                "visibility",
                MSG_VISIBILITIES,
                payload.visibility.as_deref().unwrap_or("visible"),
            )?,
            text: payload.text.clone().unwrap_or_default(),
            attachments,
            label_ids,
            created_on,
            modified_on: payload.modified_on.unwrap_or(created_on),
            sent_on: payload.sent_on,
        };
        let upserted = scope.write(record.id(), DestinationRecord::Message(row)).await?;

        scope.stats.fetched(EntityType::Attachment, attachment_count);
        for _ in 0..attachment_count {
            scope.stats.record(EntityType::Attachment, Outcome::from_created(upserted.created));
        }
        Ok(())
    }
}
