//! One importer per source resource, plus the page driver they share.
//!
//! Importers are stateless: everything they read or write travels through
//! an [`ImportScope`], so the orchestrator owns all per-run state.

mod archives;
mod broadcasts;
mod campaigns;
mod channels;
mod contacts;
mod fields;
mod flow_runs;
mod flow_starts;
mod flows;
mod groups;
mod labels;
mod messages;
mod org;
mod users;

use std::collections::HashMap;

use async_trait::async_trait;
use temba_migrate_client::ApiClient;
use temba_migrate_client::api_types::ObjectRef;
use temba_migrate_core::{Cursor, EntityType, SourceId, SourceRecord};
use temba_migrate_storage::{DestinationRecord, Upserted};
use temba_migrate_storage::traits::RecordStore;

pub use archives::ArchiveImporter;
pub use broadcasts::BroadcastImporter;
pub use campaigns::{CampaignEventImporter, CampaignImporter};
pub use channels::{ChannelEventImporter, ChannelImporter};
pub use contacts::ContactImporter;
pub use fields::FieldImporter;
pub use flow_runs::FlowRunImporter;
pub use flow_starts::FlowStartImporter;
pub use flows::FlowImporter;
pub use groups::GroupImporter;
pub use labels::LabelImporter;
pub use messages::MessageImporter;
pub(crate) use org::sync_org;
pub use users::UserImporter;

use crate::context::ImportContext;
use crate::error::ImportError;
use crate::remap::RemapTable;
use crate::stats::{ImportStats, Outcome, RunStats};

/// Destination facts about imported contact fields, keyed by field key.
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    fields: HashMap<String, FieldInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub uuid: String,
    /// Single-letter value type code.
    pub value_type: String,
}

impl FieldCatalog {
    pub fn insert(&mut self, key: impl Into<String>, info: FieldInfo) {
        self.fields.insert(key.into(), info);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldInfo> {
        self.fields.get(key)
    }
}

/// Result key → node UUID of every imported flow, keyed by flow UUID.
#[derive(Debug, Clone, Default)]
pub struct FlowCatalog {
    result_nodes: HashMap<String, HashMap<String, String>>,
}

impl FlowCatalog {
    pub fn insert(&mut self, flow_uuid: impl Into<String>, result_nodes: HashMap<String, String>) {
        self.result_nodes.insert(flow_uuid.into(), result_nodes);
    }

    #[must_use]
    pub fn result_node(&self, flow_uuid: &str, key: &str) -> Option<&str> {
        self.result_nodes.get(flow_uuid)?.get(key).map(String::as_str)
    }
}

/// Mutable per-run state handed to importers, plus the read-only context.
pub struct ImportScope<'a> {
    pub remap: &'a mut RemapTable,
    pub fields: &'a mut FieldCatalog,
    pub flows: &'a mut FlowCatalog,
    pub stats: &'a mut RunStats,
    pub store: &'a dyn RecordStore,
    pub ctx: &'a ImportContext,
}

impl ImportScope<'_> {
    /// Upsert `row`, count the outcome and remap `source_id` to the
    /// destination id.
    pub async fn write(
        &mut self,
        source_id: &SourceId,
        row: DestinationRecord,
    ) -> Result<Upserted, ImportError> {
        let entity = row.entity();
        let upserted = self.store.upsert(self.ctx.scope, &row).await?;
        self.stats.record(entity, Outcome::from_created(upserted.created));
        self.remap.put(entity, source_id.clone(), upserted.id)?;
        Ok(upserted)
    }

    pub fn skip(&mut self, entity: EntityType) {
        self.stats.record(entity, Outcome::Skipped);
    }
}

/// Transforms one kind of source record into destination rows.
#[async_trait]
pub trait EntityImporter: Send + Sync {
    /// Resource this importer pages through.
    fn entity(&self) -> EntityType;

    /// Entity types whose remap entries this importer writes.
    fn provides(&self) -> &'static [EntityType];

    /// Entity types that must be imported first.
    fn depends_on(&self) -> &'static [EntityType];

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError>;
}

/// Every importer, in dependency order.
#[must_use]
pub fn pipeline() -> Vec<Box<dyn EntityImporter>> {
    vec![
        Box::new(FieldImporter),
        Box::new(GroupImporter),
        Box::new(LabelImporter),
        Box::new(ContactImporter),
        Box::new(ArchiveImporter),
        Box::new(ChannelImporter),
        Box::new(ChannelEventImporter),
        Box::new(UserImporter),
        Box::new(FlowImporter),
        Box::new(CampaignImporter),
        Box::new(CampaignEventImporter),
        Box::new(FlowStartImporter),
        Box::new(FlowRunImporter),
        Box::new(BroadcastImporter),
        Box::new(MessageImporter),
    ]
}

/// Failure inside [`import_all`], located by page and record.
#[derive(Debug)]
pub struct ImporterFailure {
    pub cursor: Option<Cursor>,
    pub source_id: Option<SourceId>,
    pub error: ImportError,
}

/// Page through every record of the importer's resource and import each one.
pub async fn import_all(
    client: &ApiClient,
    importer: &dyn EntityImporter,
    scope: &mut ImportScope<'_>,
) -> Result<ImportStats, ImporterFailure> {
    let entity = importer.entity();
    let mut cursor: Option<Cursor> = None;
    let mut pages: u64 = 0;

    loop {
        let page = client.fetch(entity, cursor.as_ref()).await.map_err(|e| ImporterFailure {
            cursor: cursor.clone(),
            source_id: None,
            error: e.into(),
        })?;
        scope.stats.fetched(entity, page.records.len());

        for record in &page.records {
            importer.import_record(record, scope).await.map_err(|error| ImporterFailure {
                cursor: cursor.clone(),
                source_id: Some(record.id().clone()),
                error,
            })?;
        }

        pages = pages.saturating_add(1);
        tracing::info!(%entity, page = pages, records = page.records.len(), "imported page");
        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(scope.stats.get(entity))
}

pub(crate) fn ref_id(object: &ObjectRef) -> SourceId {
    SourceId::from(object.uuid.as_str())
}

pub(crate) fn ref_ids(objects: &[ObjectRef]) -> Vec<SourceId> {
    objects.iter().map(ref_id).collect()
}
