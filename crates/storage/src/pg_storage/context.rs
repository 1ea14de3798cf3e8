//! ContextStore implementation for PgStore.

use async_trait::async_trait;
use temba_migrate_core::EntityType;

use super::{PgStore, parse_uuid};
use crate::error::StorageError;
use crate::traits::ContextStore;
use crate::types::{OrgSettings, WriteScope};

/// Rows of a flushed table that survive the flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keep {
    Nothing,
    /// Rows the destination creates itself (`is_system`).
    System,
    /// Rows owned by the admin user.
    Admin,
    /// Admin rows tied to the destination organization.
    AdminMembership,
    /// The destination organization itself.
    Org,
}

impl Keep {
    const fn filter(self) -> &'static str {
        match self {
            Self::Nothing => "",
            Self::System => " WHERE NOT is_system",
            Self::Admin => " WHERE user_id <> $1",
            Self::AdminMembership => " WHERE user_id <> $1 OR org_id <> $2",
            Self::Org => " WHERE id <> $1",
        }
    }
}

/// Tables emptied by a flush, children before parents. Tables missing from
/// the destination's schema version are skipped.
const FLUSH_TABLES: [(&str, Keep); 54] = [
    ("flows_flowpathcount", Keep::Nothing),
    ("flows_flowpathrecentrun", Keep::Nothing),
    ("flows_flowcategorycount", Keep::Nothing),
    ("flows_flownodecount", Keep::Nothing),
    ("flows_flowruncount", Keep::Nothing),
    ("flows_flowstartcount", Keep::Nothing),
    ("flows_flowrun", Keep::Nothing),
    ("flows_flowsession", Keep::Nothing),
    ("channels_channellog", Keep::Nothing),
    ("msgs_msg_labels", Keep::Nothing),
    ("msgs_msg", Keep::Nothing),
    ("msgs_broadcastmsgcount", Keep::Nothing),
    ("msgs_broadcast_urns", Keep::Nothing),
    ("msgs_broadcast_contacts", Keep::Nothing),
    ("msgs_broadcast_groups", Keep::Nothing),
    ("msgs_broadcast", Keep::Nothing),
    ("flows_flowstart_contacts", Keep::Nothing),
    ("flows_flowstart_groups", Keep::Nothing),
    ("flows_flowstart", Keep::Nothing),
    ("campaigns_eventfire", Keep::Nothing),
    ("campaigns_campaignevent", Keep::Nothing),
    ("campaigns_campaign", Keep::Nothing),
    ("tickets_ticketevent", Keep::Nothing),
    ("tickets_ticketcount", Keep::Nothing),
    ("tickets_ticket", Keep::Nothing),
    ("tickets_topic", Keep::Nothing),
    ("tickets_ticketer", Keep::Nothing),
    ("channels_channelevent", Keep::Nothing),
    ("channels_channelcount", Keep::Nothing),
    ("contacts_contacturn", Keep::Nothing),
    ("contacts_contactgroup_contacts", Keep::Nothing),
    ("contacts_contactgroupcount", Keep::Nothing),
    ("contacts_contact", Keep::Nothing),
    ("flows_flow_labels", Keep::Nothing),
    ("flows_flowrevision", Keep::Nothing),
    ("flows_flow", Keep::Nothing),
    ("channels_channel", Keep::Nothing),
    ("archives_archive", Keep::Nothing),
    ("msgs_label", Keep::Nothing),
    ("contacts_contactgroup", Keep::System),
    ("contacts_contactfield", Keep::System),
    ("api_apitoken", Keep::AdminMembership),
    ("orgs_usersettings", Keep::Admin),
    ("orgs_org_administrators", Keep::AdminMembership),
    ("orgs_org_editors", Keep::AdminMembership),
    ("orgs_org_viewers", Keep::AdminMembership),
    ("orgs_org_agents", Keep::AdminMembership),
    ("orgs_org_surveyors", Keep::AdminMembership),
    ("orgs_orgmembership", Keep::AdminMembership),
    ("auth_user_groups", Keep::Admin),
    ("auth_user_user_permissions", Keep::Admin),
    ("orgs_invitation", Keep::Nothing),
    ("orgs_backuptoken", Keep::Admin),
    ("orgs_org", Keep::Org),
];

fn flush_sql(table: &str, keep: Keep) -> String {
    format!("DELETE FROM {table}{}", keep.filter())
}

/// Name of the user account the destination needs for anonymous access.
const ANONYMOUS_USERNAME: &str = "AnonymousUser";

fn table_for(entity: EntityType) -> Option<&'static str> {
    match entity {
        EntityType::Org => Some("orgs_org"),
        EntityType::Field => Some("contacts_contactfield WHERE NOT is_system"),
        EntityType::Group => Some("contacts_contactgroup WHERE NOT is_system"),
        EntityType::Label => Some("msgs_label"),
        EntityType::Contact => Some("contacts_contact"),
        EntityType::ContactUrn => Some("contacts_contacturn"),
        EntityType::Archive => Some("archives_archive"),
        EntityType::Channel => Some("channels_channel"),
        EntityType::ChannelEvent => Some("channels_channelevent"),
        EntityType::User => Some("auth_user"),
        EntityType::Flow => Some("flows_flow"),
        EntityType::Campaign => Some("campaigns_campaign"),
        EntityType::CampaignEvent => Some("campaigns_campaignevent"),
        EntityType::FlowStart => Some("flows_flowstart"),
        EntityType::FlowRun => Some("flows_flowrun"),
        EntityType::Broadcast => Some("msgs_broadcast"),
        EntityType::Message => Some("msgs_msg"),
        EntityType::Attachment => None,
    }
}

#[async_trait]
impl ContextStore for PgStore {
    async fn load_context(&self) -> Result<WriteScope, StorageError> {
        let admin_id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM auth_user WHERE is_superuser AND is_active ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::MissingContext("admin user"))?;
        let org_id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM orgs_org WHERE is_active ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::MissingContext("org"))?;
        Ok(WriteScope { org_id, admin_id })
    }

    async fn system_fields(&self, org_id: i64) -> Result<Vec<(String, i64)>, StorageError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT key, id FROM contacts_contactfield
             WHERE org_id = $1 AND is_system AND is_active ORDER BY id",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_org(&self, org_id: i64, settings: &OrgSettings) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE orgs_org SET
               uuid = $2,
               name = $3,
               timezone = COALESCE($4, timezone),
               date_format = COALESCE($5, date_format),
               flow_languages = $6,
               is_anon = $7,
               country_id = COALESCE(
                 (SELECT id FROM locations_adminboundary WHERE level = 0 AND name = $8 LIMIT 1),
                 country_id)
             WHERE id = $1",
        )
        .bind(org_id)
        .bind(parse_uuid("uuid", &settings.uuid)?)
        .bind(&settings.name)
        .bind(&settings.timezone)
        .bind(&settings.date_format)
        .bind(&settings.languages)
        .bind(settings.is_anon)
        .bind(&settings.country)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound { entity: "org", id: org_id.to_string() });
        }
        Ok(())
    }

    async fn flush(&self, keep: WriteScope) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;
        let mut removed: u64 = 0;
        for (table, keep_rows) in FLUSH_TABLES {
            let present = sqlx::query_scalar::<_, bool>("SELECT to_regclass($1) IS NOT NULL")
                .bind(table)
                .fetch_one(&mut *tx)
                .await?;
            if !present {
                tracing::debug!(table, "not in destination schema, skipped");
                continue;
            }
            let sql = flush_sql(table, keep_rows);
            let query = sqlx::query(&sql);
            let query = match keep_rows {
                Keep::Nothing | Keep::System => query,
                Keep::Admin => query.bind(keep.admin_id),
                Keep::AdminMembership => query.bind(keep.admin_id).bind(keep.org_id),
                Keep::Org => query.bind(keep.org_id),
            };
            let deleted = query.execute(&mut *tx).await?.rows_affected();
            tracing::debug!(table, deleted, "flushed");
            removed = removed.saturating_add(deleted);
        }
        let users = sqlx::query("DELETE FROM auth_user WHERE id <> $1 AND username <> $2")
            .bind(keep.admin_id)
            .bind(ANONYMOUS_USERNAME)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed.saturating_add(users))
    }

    async fn count(&self, entity: EntityType) -> Result<u64, StorageError> {
        let count: i64 = match table_for(entity) {
            Some(table) => {
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                    .fetch_one(&self.pool)
                    .await?
            },
            None => {
                sqlx::query_scalar(
                    "SELECT COALESCE(SUM(cardinality(attachments)), 0)::bigint FROM msgs_msg",
                )
                .fetch_one(&self.pool)
                .await?
            },
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(table: &str) -> usize {
        FLUSH_TABLES
            .iter()
            .position(|(t, _)| *t == table)
            .unwrap_or_else(|| panic!("{table} is not flushed"))
    }

    #[test]
    fn flush_deletes_children_before_parents() {
        let references = [
            ("flows_flowruncount", "flows_flow"),
            ("flows_flowcategorycount", "flows_flow"),
            ("flows_flowpathcount", "flows_flow"),
            ("flows_flowrun", "flows_flowstart"),
            ("flows_flowrun", "contacts_contact"),
            ("flows_flowrun", "flows_flowsession"),
            ("flows_flowsession", "contacts_contact"),
            ("msgs_msg", "flows_flow"),
            ("msgs_msg", "contacts_contacturn"),
            ("msgs_msg", "msgs_broadcast"),
            ("msgs_broadcastmsgcount", "msgs_broadcast"),
            ("campaigns_campaignevent", "contacts_contactfield"),
            ("campaigns_campaignevent", "flows_flow"),
            ("campaigns_campaign", "contacts_contactgroup"),
            ("tickets_ticket", "contacts_contact"),
            ("tickets_ticket", "tickets_topic"),
            ("tickets_ticket", "tickets_ticketer"),
            ("channels_channelcount", "channels_channel"),
            ("channels_channelevent", "contacts_contact"),
            ("contacts_contacturn", "channels_channel"),
            ("contacts_contactgroupcount", "contacts_contactgroup"),
            ("contacts_contact", "flows_flow"),
            ("flows_flowrevision", "flows_flow"),
            ("api_apitoken", "orgs_org"),
            ("orgs_usersettings", "orgs_org"),
            ("orgs_org_editors", "orgs_org"),
        ];
        for (child, parent) in references {
            assert!(position(child) < position(parent), "{child} flushed after {parent}");
        }
    }

    #[test]
    fn flush_keeps_destination_context() {
        assert_eq!(
            flush_sql("orgs_org_viewers", Keep::AdminMembership),
            "DELETE FROM orgs_org_viewers WHERE user_id <> $1 OR org_id <> $2"
        );
        assert_eq!(flush_sql("orgs_org", Keep::Org), "DELETE FROM orgs_org WHERE id <> $1");
        assert_eq!(
            flush_sql("orgs_usersettings", Keep::Admin),
            "DELETE FROM orgs_usersettings WHERE user_id <> $1"
        );
        assert_eq!(
            flush_sql("contacts_contactfield", Keep::System),
            "DELETE FROM contacts_contactfield WHERE NOT is_system"
        );
    }
}
