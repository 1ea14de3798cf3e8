//! Runs the optional flush and then every importer in dependency order.

use temba_migrate_client::ApiClient;
use temba_migrate_core::{Cursor, EntityType, SourceId};
use temba_migrate_storage::traits::ContextStore;
use temba_migrate_storage::{StorageBackend, WriteScope};

use crate::context::{ImportContext, ImportOptions};
use crate::error::{ImportError, RunFailure, RunStage};
use crate::importers::{FieldCatalog, FlowCatalog, ImportScope, import_all, pipeline, sync_org};
use crate::remap::RemapTable;
use crate::stats::RunStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Flushing,
    Importing(EntityType),
    Completed,
    Failed,
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub scope: WriteScope,
    /// Rows removed by the flush, `None` when no flush was requested.
    pub flushed: Option<u64>,
    pub stats: RunStats,
    pub remap: RemapTable,
}

pub struct Orchestrator {
    client: ApiClient,
    store: StorageBackend,
    options: ImportOptions,
    state: RunState,
    last_completed: Option<EntityType>,
}

impl Orchestrator {
    #[must_use]
    pub const fn new(client: ApiClient, store: StorageBackend, options: ImportOptions) -> Self {
        Self { client, store, options, state: RunState::Idle, last_completed: None }
    }

    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }

    fn fail(
        &mut self,
        stage: RunStage,
        cursor: Option<Cursor>,
        source_id: Option<SourceId>,
        source: ImportError,
    ) -> RunFailure {
        self.transition(RunState::Failed);
        let failure =
            RunFailure { stage, cursor, source_id, last_completed: self.last_completed, source };
        tracing::error!(%failure, "import run failed");
        failure
    }

    /// Run the whole import. Stops at the first fatal error; nothing written
    /// before it is rolled back.
    pub async fn run(&mut self) -> Result<RunReport, RunFailure> {
        self.last_completed = None;
        let scope = match self.store.load_context().await {
            Ok(scope) => scope,
            Err(e) => return Err(self.fail(RunStage::Setup, None, None, e.into())),
        };
        tracing::info!(
            backend = self.store.name(),
            org_id = scope.org_id,
            admin_id = scope.admin_id,
            "destination context resolved"
        );

        let flushed = if self.options.flush {
            self.transition(RunState::Flushing);
            match self.store.flush(scope).await {
                Ok(removed) => {
                    tracing::info!(removed, "destination flushed");
                    Some(removed)
                },
                Err(e) => return Err(self.fail(RunStage::Flush, None, None, e.into())),
            }
        } else {
            None
        };

        let ctx = ImportContext::new(scope, &self.options, &self.client.config().base_url);
        let mut remap = RemapTable::new();
        let mut fields = FieldCatalog::default();
        let mut flows = FlowCatalog::default();
        let mut stats = RunStats::default();

        if let Err(e) = self.seed_system_fields(scope.org_id, &mut remap).await {
            return Err(self.fail(RunStage::Setup, None, None, e));
        }

        self.transition(RunState::Importing(EntityType::Org));
        if let Err(e) = sync_org(&self.client, &self.store, &ctx, &mut remap, &mut stats).await {
            return Err(self.fail(RunStage::Entity(EntityType::Org), None, None, e));
        }
        self.last_completed = Some(EntityType::Org);

        for importer in pipeline() {
            let entity = importer.entity();
            self.transition(RunState::Importing(entity));
            let mut import_scope = ImportScope {
                remap: &mut remap,
                fields: &mut fields,
                flows: &mut flows,
                stats: &mut stats,
                store: &self.store,
                ctx: &ctx,
            };
            let result = import_all(&self.client, importer.as_ref(), &mut import_scope).await;
            match result {
                Ok(entity_stats) => {
                    tracing::info!(%entity, %entity_stats, "entity import complete");
                    warn_follow_up(entity, entity_stats.created.saturating_add(entity_stats.updated), &ctx);
                    self.last_completed = Some(entity);
                },
                Err(failure) => {
                    return Err(self.fail(
                        RunStage::Entity(entity),
                        failure.cursor,
                        failure.source_id,
                        failure.error,
                    ));
                },
            }
        }

        self.transition(RunState::Completed);
        for (entity, entity_stats) in stats.iter() {
            tracing::info!(%entity, %entity_stats, "run total");
        }
        Ok(RunReport { scope, flushed, stats, remap })
    }

    /// Campaign events may be relative to destination system fields, which
    /// the source does not list among its fields.
    async fn seed_system_fields(
        &self,
        org_id: i64,
        remap: &mut RemapTable,
    ) -> Result<(), ImportError> {
        let system_fields = self.store.system_fields(org_id).await?;
        for (key, id) in &system_fields {
            remap.put(EntityType::Field, SourceId::new(key.clone()), *id)?;
        }
        tracing::debug!(count = system_fields.len(), "system fields remapped");
        Ok(())
    }
}

/// Defaults written for data the source API does not expose.
fn warn_follow_up(entity: EntityType, written: u64, ctx: &ImportContext) {
    if written == 0 {
        return;
    }
    match entity {
        EntityType::Channel => tracing::warn!(
            channels = written,
            channel_type = %ctx.channel_type,
            "channels written with a placeholder type and empty config; set them manually"
        ),
        EntityType::Group => tracing::warn!(
            groups = written,
            group_type = %ctx.group_type,
            "groups written with a fixed group type; review smart groups manually"
        ),
        _ => {},
    }
}
