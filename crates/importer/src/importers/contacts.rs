use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};
use temba_migrate_client::api_types::ContactPayload;
use temba_migrate_core::{EntityType, SourceId, SourceRecord, ValidationError};
use temba_migrate_storage::{ContactRow, DestinationRecord, UrnRow};

use super::{EntityImporter, FieldCatalog, ImportScope, ref_ids};
use crate::choices::{CONTACT_STATUSES, code, parse_urn};
use crate::error::ImportError;

/// Priority of a contact's first URN; later URNs rank one lower each.
const TOP_URN_PRIORITY: i32 = 1000;

pub struct ContactImporter;

/// Older sources lack `status` and expose `blocked`/`stopped` flags instead.
fn contact_status(record: &SourceRecord, payload: &ContactPayload) -> Result<String, ValidationError> {
    match payload.status.as_deref() {
        Some(status) => code(record, "status", CONTACT_STATUSES, status),
        None if payload.blocked == Some(true) => Ok("B".to_owned()),
        None if payload.stopped == Some(true) => Ok("S".to_owned()),
        None => Ok("A".to_owned()),
    }
}

/// Engine key under which the destination stores a value of this type.
fn engine_key(value_type: &str) -> &'static str {
    match value_type {
        "N" => "number",
        "D" => "datetime",
        "S" => "state",
        "I" => "district",
        "W" => "ward",
        _ => "text",
    }
}

/// Re-key field values by destination field UUID. Null values are dropped.
fn contact_fields(
    record: &SourceRecord,
    values: &Map<String, Value>,
    catalog: &FieldCatalog,
) -> Result<Value, ValidationError> {
    let mut fields = Map::new();
    for (key, value) in values {
        if value.is_null() {
            continue;
        }
        let info = catalog.get(key).ok_or_else(|| record.invalid(format!("unknown field `{key}`")))?;
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let mut stored = Map::new();
        stored.insert("text".to_owned(), Value::String(text));
        let engine = engine_key(&info.value_type);
        if engine != "text" {
            stored.insert(engine.to_owned(), value.clone());
        }
        fields.insert(info.uuid.clone(), Value::Object(stored));
    }
    Ok(Value::Object(fields))
}

#[async_trait]
impl EntityImporter for ContactImporter {
    fn entity(&self) -> EntityType {
        EntityType::Contact
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::Contact, EntityType::ContactUrn]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[EntityType::Field, EntityType::Group]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: ContactPayload = record.decode()?;
        let group_ids = scope.remap.get_all(EntityType::Group, &ref_ids(&payload.groups))?;
        let urns = payload
            .urns
            .iter()
            .map(|urn| parse_urn(urn).ok_or_else(|| record.invalid(format!("malformed URN `{urn}`"))))
            .collect::<Result<Vec<_>, _>>()?;

        let now = Utc::now();
        let row = ContactRow {
            uuid: payload.uuid.clone(),
            name: payload.name.clone().filter(|n| !n.is_empty()),
            language: payload.language.clone(),
            status: contact_status(record, &payload)?,
            fields: if payload.fields.is_empty() {
                json!({})
            } else {
                contact_fields(record, &payload.fields, scope.fields)?
            },
            group_ids,
            created_on: payload.created_on.unwrap_or(now),
            modified_on: payload.modified_on.or(payload.created_on).unwrap_or(now),
            last_seen_on: payload.last_seen_on,
        };
        let contact_id = scope.write(record.id(), DestinationRecord::Contact(row)).await?.id;

        scope.stats.fetched(EntityType::ContactUrn, urns.len());
        let mut priority = TOP_URN_PRIORITY;
        for urn in urns {
            let source_id = SourceId::new(urn.identity.clone());
            let row = UrnRow {
                contact_id,
                identity: urn.identity,
                scheme: urn.scheme,
                path: urn.path,
                display: urn.display,
                priority,
            };
            scope.write(&source_id, DestinationRecord::ContactUrn(row)).await?;
            priority = priority.saturating_sub(1);
        }
        Ok(())
    }
}
