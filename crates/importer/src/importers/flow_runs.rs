use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};
use temba_migrate_client::api_types::{FlowRunPayload, RunStep};
use temba_migrate_core::{EntityType, SourceRecord};
use temba_migrate_storage::{DestinationRecord, FlowRunRow};

use super::{EntityImporter, FlowCatalog, ImportScope, ref_id};
use crate::choices::{RUN_EXIT_TYPES, code};
use crate::error::ImportError;

/// Status of a run the source reports without an exit type.
const ACTIVE_STATUS: &str = "A";

pub struct FlowRunImporter;

#[async_trait]
impl EntityImporter for FlowRunImporter {
    fn entity(&self) -> EntityType {
        EntityType::FlowRun
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::FlowRun]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[EntityType::Flow, EntityType::Contact, EntityType::FlowStart]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: FlowRunPayload = record.decode()?;
        let Some(flow) = &payload.flow else {
            tracing::warn!(run = %payload.uuid, "skipping flow run without a flow");
            scope.skip(EntityType::FlowRun);
            return Ok(());
        };
        let flow_id = scope.remap.get(EntityType::Flow, &ref_id(flow))?;
        let contact_id = scope.remap.get(EntityType::Contact, &ref_id(&payload.contact))?;
        let start_id = payload
            .start
            .as_ref()
            .and_then(|start| scope.remap.get_optional(EntityType::FlowStart, &ref_id(start)));

        let (results, moved_nodes) = run_results(&payload, &flow.uuid, &*scope.flows);
        let status = match payload.exit_type.as_deref() {
            Some(exit_type) => code(record, "exit_type", RUN_EXIT_TYPES, exit_type)?,
            None => ACTIVE_STATUS.to_owned(),
        };
        let created_on = payload.created_on.unwrap_or_else(Utc::now);
        let row = FlowRunRow {
            uuid: payload.uuid.clone(),
            flow_id,
            contact_id,
            start_id,
            responded: payload.responded,
            path: run_path(&payload.path, &moved_nodes),
            results,
            status,
            created_on,
            modified_on: payload.modified_on.unwrap_or(created_on),
            exited_on: payload.exited_on,
        };
        scope.write(record.id(), DestinationRecord::FlowRun(row)).await?;
        Ok(())
    }
}

/// Results keyed by result key, with node UUIDs taken from the destination
/// flow's metadata. Also returns the source → destination node moves seen.
fn run_results(
    payload: &FlowRunPayload,
    flow_uuid: &str,
    flows: &FlowCatalog,
) -> (Value, HashMap<String, String>) {
    let mut results = Map::new();
    let mut moved = HashMap::new();
    for (key, value) in &payload.values {
        let node_uuid = match flows.result_node(flow_uuid, key) {
            Some(node) => Some(node.to_owned()),
            None => {
                tracing::warn!(run = %payload.uuid, key, "result key not in flow metadata");
                value.node.clone()
            },
        };
        if let (Some(old), Some(new)) = (&value.node, &node_uuid)
            && old != new
        {
            moved.insert(old.clone(), new.clone());
        }
        results.insert(
            key.clone(),
            json!({
                "node_uuid": node_uuid,
                "name": value.name,
                "created_on": value.time,
                "input": value.input.as_ref().map(loosen),
                "value": value.value.as_ref().map(loosen),
                "category": value.category,
            }),
        );
    }
    (Value::Object(results), moved)
}

/// Each step exits towards the node of the step after it.
fn run_path(steps: &[RunStep], moved: &HashMap<String, String>) -> Value {
    let nodes: Vec<&str> = steps
        .iter()
        .map(|step| moved.get(&step.node).map_or(step.node.as_str(), String::as_str))
        .collect();
    let path = steps
        .iter()
        .zip(&nodes)
        .enumerate()
        .map(|(i, (step, node))| {
            json!({
                "node_uuid": node,
                "arrived_on": step.time,
                "exit_uuid": nodes.get(i.saturating_add(1)),
            })
        })
        .collect();
    Value::Array(path)
}

/// Group results arrive as `[{name: A, uuid: 1}, {name: B, uuid: 2}]` text;
/// turn those back into objects and leave every other value alone.
fn loosen(value: &Value) -> Value {
    match value {
        Value::String(text) => parse_group_text(text).unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

fn parse_group_text(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        return inner
            .split("}, ")
            .map(|item| {
                if item.ends_with('}') {
                    group_object(item)
                } else {
                    group_object(&format!("{item}}}"))
                }
            })
            .collect::<Option<Vec<_>>>()
            .map(Value::Array);
    }
    group_object(text)
}

/// `{name: Some, name, uuid: 123}`: the name may itself contain commas.
fn group_object(text: &str) -> Option<Value> {
    let inner = text.strip_prefix('{')?.strip_suffix('}')?;
    let (name, uuid) = inner.rsplit_once(", ")?;
    let name = name.strip_prefix("name: ")?;
    let uuid = uuid.strip_prefix("uuid: ")?;
    Some(json!({"name": name, "uuid": uuid}))
}
