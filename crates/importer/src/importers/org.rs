use temba_migrate_client::ApiClient;
use temba_migrate_client::api_types::OrgPayload;
use temba_migrate_core::{EntityType, SourceRecord, ValidationError};
use temba_migrate_storage::OrgSettings;
use temba_migrate_storage::traits::ContextStore;

use crate::choices::{DATE_STYLES, code};
use crate::context::ImportContext;
use crate::error::ImportError;
use crate::remap::RemapTable;
use crate::stats::{Outcome, RunStats};

fn org_settings(record: &SourceRecord) -> Result<OrgSettings, ValidationError> {
    let payload: OrgPayload = record.decode()?;
    let date_format =
        payload.date_style.as_deref().map(|style| code(record, "date style", DATE_STYLES, style)).transpose()?;

    // Primary language leads the destination's flow languages.
    let mut languages: Vec<String> = payload.primary_language.into_iter().collect();
    for language in payload.languages {
        if !languages.contains(&language) {
            languages.push(language);
        }
    }

    Ok(OrgSettings {
        uuid: payload.uuid,
        name: payload.name,
        timezone: payload.timezone,
        date_format,
        languages,
        country: payload.country,
        is_anon: payload.anon,
    })
}

/// Copy the source organization's settings onto the destination organization
/// and remap its UUID.
pub(crate) async fn sync_org(
    client: &ApiClient,
    store: &dyn ContextStore,
    ctx: &ImportContext,
    remap: &mut RemapTable,
    stats: &mut RunStats,
) -> Result<(), ImportError> {
    let record = client.fetch_org().await?;
    stats.fetched(EntityType::Org, 1);
    let settings = org_settings(&record)?;
    store.update_org(ctx.scope.org_id, &settings).await?;
    remap.put(EntityType::Org, record.id().clone(), ctx.scope.org_id)?;
    stats.record(EntityType::Org, Outcome::Updated);
    tracing::info!(org = %settings.name, "synced organization settings");
    Ok(())
}
