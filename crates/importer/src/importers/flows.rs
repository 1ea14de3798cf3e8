use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use temba_migrate_client::api_types::{FlowPayload, FlowRunTotals};
use temba_migrate_core::{EntityType, SourceRecord};
use temba_migrate_storage::{DestinationRecord, FlowRow};

use super::{EntityImporter, ImportScope, ref_id};
use crate::choices::{FLOW_TYPES, code};
use crate::error::ImportError;

/// Flow expiry when the source omits it: one week.
const DEFAULT_EXPIRES_MINUTES: i64 = 60 * 24 * 7;

/// Flow metadata only; flow definitions are uploaded through the destination
/// frontend.
pub struct FlowImporter;

#[async_trait]
impl EntityImporter for FlowImporter {
    fn entity(&self) -> EntityType {
        EntityType::Flow
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::Flow]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[EntityType::Label]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: FlowPayload = record.decode()?;

        // Flow labels are not exposed by the labels resource; keep the ones
        // that happen to resolve.
        let label_ids: Vec<i64> = payload
            .labels
            .iter()
            .filter_map(|label| scope.remap.get_optional(EntityType::Label, &ref_id(label)))
            .collect();
        if label_ids.len() < payload.labels.len() {
            tracing::warn!(
                flow = %payload.uuid,
                dropped = payload.labels.len().saturating_sub(label_ids.len()),
                "flow labels without a destination label"
            );
        }

        let expires = payload.expires.unwrap_or(DEFAULT_EXPIRES_MINUTES);
        let expires_after_minutes = i32::try_from(expires)
            .map_err(|_| record.invalid(format!("expiry {expires} out of range")))?;
        let results: Vec<_> = payload
            .results
            .iter()
            .map(|r| {
                json!({
                    "key": r.key,
                    "name": r.name,
                    "categories": r.categories,
                    "node_uuids": r.node_uuids,
                })
            })
            .collect();

        let result_nodes: HashMap<String, String> = payload
            .results
            .iter()
            .filter_map(|r| r.node_uuids.first().map(|node| (r.key.clone(), node.clone())))
            .collect();
        scope.flows.insert(payload.uuid.clone(), result_nodes);

        let created_on = payload.created_on.unwrap_or_else(Utc::now);
        let row = FlowRow {
            uuid: payload.uuid.clone(),
            name: payload.name.clone(),
            flow_type: code(record, "type", FLOW_TYPES, &payload.flow_type)?,
            is_archived: payload.archived,
            expires_after_minutes,
            metadata: json!({ "results": results }),
            label_ids,
            run_counts: payload.runs.as_ref().map(run_counts).unwrap_or_default(),
            created_on,
            modified_on: payload.modified_on.unwrap_or(created_on),
        };
        scope.write(record.id(), DestinationRecord::Flow(row)).await?;
        Ok(())
    }
}

/// Exit type code → run count. Active runs are not counted by exit type.
fn run_counts(runs: &FlowRunTotals) -> Vec<(String, i64)> {
    let mut counts = vec![
        ("C".to_owned(), runs.completed),
        ("I".to_owned(), runs.interrupted),
        ("E".to_owned(), runs.expired),
    ];
    if let Some(failed) = runs.failed {
        counts.push(("F".to_owned(), failed));
    }
    counts
}
