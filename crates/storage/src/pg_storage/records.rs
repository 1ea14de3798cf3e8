//! RecordStore implementation for PgStore.
//!
//! Each row is looked up by natural key inside a transaction, then written
//! with a single insert-or-update statement; link tables are replaced
//! wholesale so re-runs converge on the source state.

use async_trait::async_trait;
use sqlx::PgConnection;

use super::{PgStore, find_id, parse_uuid, replace_links, row_to_upserted, upsert_sql};
use crate::error::StorageError;
use crate::traits::RecordStore;
use crate::types::{
    ArchiveRow, BroadcastRow, CampaignEventRow, CampaignRow, ChannelEventRow, ChannelRow,
    ContactRow, DestinationRecord, FieldRow, FlowRow, FlowRunRow, FlowStartRow, GroupRow,
    LabelRow, MessageRow, Upserted, UrnRow, UserRow, WriteScope,
};

/// Organization role tables by role code.
const ORG_ROLE_TABLES: [(&str, &str); 5] = [
    ("A", "orgs_org_administrators"),
    ("E", "orgs_org_editors"),
    ("V", "orgs_org_viewers"),
    ("T", "orgs_org_agents"),
    ("S", "orgs_org_surveyors"),
];

#[async_trait]
impl RecordStore for PgStore {
    async fn upsert(
        &self,
        scope: WriteScope,
        record: &DestinationRecord,
    ) -> Result<Upserted, StorageError> {
        let mut tx = self.pool.begin().await?;
        let upserted = match record {
            DestinationRecord::Field(row) => upsert_field(&mut tx, scope, row).await?,
            DestinationRecord::Group(row) => upsert_group(&mut tx, scope, row).await?,
            DestinationRecord::Label(row) => upsert_label(&mut tx, scope, row).await?,
            DestinationRecord::Contact(row) => upsert_contact(&mut tx, scope, row).await?,
            DestinationRecord::ContactUrn(row) => upsert_urn(&mut tx, scope, row).await?,
            DestinationRecord::Archive(row) => upsert_archive(&mut tx, scope, row).await?,
            DestinationRecord::Channel(row) => upsert_channel(&mut tx, scope, row).await?,
            DestinationRecord::ChannelEvent(row) => upsert_channel_event(&mut tx, scope, row).await?,
            DestinationRecord::User(row) => upsert_user(&mut tx, scope, row).await?,
            DestinationRecord::Flow(row) => upsert_flow(&mut tx, scope, row).await?,
            DestinationRecord::Campaign(row) => upsert_campaign(&mut tx, scope, row).await?,
            DestinationRecord::CampaignEvent(row) => {
                upsert_campaign_event(&mut tx, scope, row).await?
            },
            DestinationRecord::FlowStart(row) => upsert_flow_start(&mut tx, scope, row).await?,
            DestinationRecord::FlowRun(row) => upsert_flow_run(&mut tx, scope, row).await?,
            DestinationRecord::Broadcast(row) => upsert_broadcast(&mut tx, scope, row).await?,
            DestinationRecord::Message(row) => upsert_message(&mut tx, scope, row).await?,
        };
        tx.commit().await?;
        Ok(upserted)
    }
}

async fn upsert_field(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &FieldRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "contacts_contactfield", "key", scope.org_id, &row.key).await?;
    let sql = upsert_sql("contacts_contactfield", &[
        "uuid",
        "org_id",
        "key",
        "name",
        "value_type",
        "show_in_table",
        "is_system",
        "is_active",
        "created_by_id",
        "modified_by_id",
        "created_on",
        "modified_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(scope.org_id)
        .bind(&row.key)
        .bind(&row.name)
        .bind(&row.value_type)
        .bind(row.show_in_table)
        .bind(false)
        .bind(true)
        .bind(scope.admin_id)
        .bind(scope.admin_id)
        .bind(row.created_on)
        .bind(row.created_on)
        .fetch_one(&mut *conn)
        .await?;
    row_to_upserted(&result)
}

async fn upsert_group(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &GroupRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "contacts_contactgroup", "uuid", scope.org_id, &row.uuid).await?;
    let sql = upsert_sql("contacts_contactgroup", &[
        "uuid",
        "org_id",
        "name",
        "query",
        "status",
        "group_type",
        "is_system",
        "is_active",
        "created_by_id",
        "modified_by_id",
        "created_on",
        "modified_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(scope.org_id)
        .bind(&row.name)
        .bind(&row.query)
        .bind(&row.status)
        .bind(&row.group_type)
        .bind(false)
        .bind(true)
        .bind(scope.admin_id)
        .bind(scope.admin_id)
        .bind(row.created_on)
        .bind(row.created_on)
        .fetch_one(&mut *conn)
        .await?;
    row_to_upserted(&result)
}

async fn upsert_label(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &LabelRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "msgs_label", "uuid", scope.org_id, &row.uuid).await?;
    let sql = upsert_sql("msgs_label", &[
        "uuid",
        "org_id",
        "name",
        "is_system",
        "is_active",
        "created_by_id",
        "modified_by_id",
        "created_on",
        "modified_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(scope.org_id)
        .bind(&row.name)
        .bind(false)
        .bind(true)
        .bind(scope.admin_id)
        .bind(scope.admin_id)
        .bind(row.created_on)
        .bind(row.created_on)
        .fetch_one(&mut *conn)
        .await?;
    row_to_upserted(&result)
}

async fn upsert_contact(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &ContactRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "contacts_contact", "uuid", scope.org_id, &row.uuid).await?;
    let sql = upsert_sql("contacts_contact", &[
        "uuid",
        "org_id",
        "name",
        "language",
        "status",
        "fields",
        "is_active",
        "created_by_id",
        "modified_by_id",
        "created_on",
        "modified_on",
        "last_seen_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(scope.org_id)
        .bind(&row.name)
        .bind(&row.language)
        .bind(&row.status)
        .bind(&row.fields)
        .bind(true)
        .bind(scope.admin_id)
        .bind(scope.admin_id)
        .bind(row.created_on)
        .bind(row.modified_on)
        .bind(row.last_seen_on)
        .fetch_one(&mut *conn)
        .await?;
    let upserted = row_to_upserted(&result)?;
    replace_links(
        conn,
        "contacts_contactgroup_contacts",
        "contact_id",
        "contactgroup_id",
        upserted.id,
        &row.group_ids,
    )
    .await?;
    Ok(upserted)
}

async fn upsert_urn(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &UrnRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "contacts_contacturn", "identity", scope.org_id, &row.identity).await?;
    let sql = upsert_sql("contacts_contacturn", &[
        "org_id",
        "contact_id",
        "identity",
        "scheme",
        "path",
        "display",
        "priority",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(scope.org_id)
        .bind(row.contact_id)
        .bind(&row.identity)
        .bind(&row.scheme)
        .bind(&row.path)
        .bind(&row.display)
        .bind(row.priority)
        .fetch_one(&mut *conn)
        .await?;
    row_to_upserted(&result)
}

async fn upsert_archive(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &ArchiveRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "archives_archive", "hash", scope.org_id, &row.hash).await?;
    let sql = upsert_sql("archives_archive", &[
        "org_id",
        "archive_type",
        "start_date",
        "period",
        "record_count",
        "size",
        "hash",
        "url",
        "build_time",
        "needs_deletion",
        "created_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(scope.org_id)
        .bind(&row.archive_type)
        .bind(row.start_date)
        .bind(&row.period)
        .bind(row.record_count)
        .bind(row.size)
        .bind(&row.hash)
        .bind(&row.url)
        .bind(0_i32)
        .bind(false)
        .bind(row.created_on)
        .fetch_one(&mut *conn)
        .await?;
    row_to_upserted(&result)
}

async fn upsert_channel(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &ChannelRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "channels_channel", "uuid", scope.org_id, &row.uuid).await?;
    let sql = upsert_sql("channels_channel", &[
        "uuid",
        "org_id",
        "name",
        "address",
        "country",
        "channel_type",
        "device",
        "config",
        "last_seen",
        "is_active",
        "created_by_id",
        "modified_by_id",
        "created_on",
        "modified_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(scope.org_id)
        .bind(&row.name)
        .bind(&row.address)
        .bind(&row.country)
        .bind(&row.channel_type)
        .bind(&row.device)
        .bind(&row.config)
        .bind(row.last_seen)
        .bind(true)
        .bind(scope.admin_id)
        .bind(scope.admin_id)
        .bind(row.created_on)
        .bind(row.modified_on)
        .fetch_one(&mut *conn)
        .await?;
    row_to_upserted(&result)
}

async fn upsert_channel_event(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &ChannelEventRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "channels_channelevent", "uuid", scope.org_id, &row.uuid).await?;
    let sql = upsert_sql("channels_channelevent", &[
        "uuid",
        "org_id",
        "event_type",
        "channel_id",
        "contact_id",
        "extra",
        "occurred_on",
        "created_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(scope.org_id)
        .bind(&row.event_type)
        .bind(row.channel_id)
        .bind(row.contact_id)
        .bind(&row.extra)
        .bind(row.occurred_on)
        .bind(row.created_on)
        .fetch_one(&mut *conn)
        .await?;
    row_to_upserted(&result)
}

/// Get-or-create the account by username, then move it to `row.role` in the
/// organization. The admin's own role is left alone.
async fn upsert_user(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &UserRow,
) -> Result<Upserted, StorageError> {
    let role_table = ORG_ROLE_TABLES
        .iter()
        .find(|(code, _)| *code == row.role)
        .map(|(_, table)| *table)
        .ok_or_else(|| StorageError::InvalidValue { column: "role", value: row.role.clone() })?;
    let result = sqlx::query(
        "INSERT INTO auth_user
           (username, email, first_name, last_name, password,
            is_superuser, is_staff, is_active, date_joined)
         VALUES ($1, $1, COALESCE($2, ''), COALESCE($3, ''), '!', FALSE, FALSE, TRUE, $4)
         ON CONFLICT (username) DO UPDATE SET
           email = EXCLUDED.email,
           first_name = EXCLUDED.first_name,
           last_name = EXCLUDED.last_name
         RETURNING id, (xmax = 0) AS inserted",
    )
    .bind(&row.email)
    .bind(&row.first_name)
    .bind(&row.last_name)
    .bind(row.date_joined)
    .fetch_one(&mut *conn)
    .await?;
    let upserted = row_to_upserted(&result)?;
    if upserted.id == scope.admin_id {
        tracing::debug!(user = %row.email, "source user is the destination admin; role kept");
        return Ok(upserted);
    }

    for (_, table) in ORG_ROLE_TABLES {
        sqlx::query(&format!("DELETE FROM {table} WHERE org_id = $1 AND user_id = $2"))
            .bind(scope.org_id)
            .bind(upserted.id)
            .execute(&mut *conn)
            .await?;
    }
    sqlx::query(&format!("INSERT INTO {role_table} (org_id, user_id) VALUES ($1, $2)"))
        .bind(scope.org_id)
        .bind(upserted.id)
        .execute(&mut *conn)
        .await?;
    Ok(upserted)
}

async fn upsert_flow(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &FlowRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "flows_flow", "uuid", scope.org_id, &row.uuid).await?;
    let sql = upsert_sql("flows_flow", &[
        "uuid",
        "org_id",
        "name",
        "flow_type",
        "is_archived",
        "expires_after_minutes",
        "metadata",
        "is_system",
        "is_active",
        "created_by_id",
        "modified_by_id",
        "saved_by_id",
        "created_on",
        "modified_on",
        "saved_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(scope.org_id)
        .bind(&row.name)
        .bind(&row.flow_type)
        .bind(row.is_archived)
        .bind(row.expires_after_minutes)
        .bind(&row.metadata)
        .bind(false)
        .bind(true)
        .bind(scope.admin_id)
        .bind(scope.admin_id)
        .bind(scope.admin_id)
        .bind(row.created_on)
        .bind(row.modified_on)
        .bind(row.modified_on)
        .fetch_one(&mut *conn)
        .await?;
    let upserted = row_to_upserted(&result)?;
    replace_links(conn, "flows_flow_labels", "flow_id", "label_id", upserted.id, &row.label_ids)
        .await?;
    replace_run_counts(conn, upserted.id, &row.run_counts).await?;
    Ok(upserted)
}

async fn replace_run_counts(
    conn: &mut PgConnection,
    flow_id: i64,
    run_counts: &[(String, i64)],
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM flows_flowruncount WHERE flow_id = $1")
        .bind(flow_id)
        .execute(&mut *conn)
        .await?;
    if run_counts.is_empty() {
        return Ok(());
    }
    let (exit_types, counts): (Vec<String>, Vec<i64>) = run_counts.iter().cloned().unzip();
    sqlx::query(
        "INSERT INTO flows_flowruncount (flow_id, exit_type, count, is_squashed)
         SELECT $1, exit_type, count::int, FALSE
         FROM UNNEST($2::text[], $3::bigint[]) AS c(exit_type, count)",
    )
    .bind(flow_id)
    .bind(&exit_types)
    .bind(&counts)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn upsert_campaign(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &CampaignRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "campaigns_campaign", "uuid", scope.org_id, &row.uuid).await?;
    let sql = upsert_sql("campaigns_campaign", &[
        "uuid",
        "org_id",
        "name",
        "group_id",
        "is_archived",
        "is_active",
        "created_by_id",
        "modified_by_id",
        "created_on",
        "modified_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(scope.org_id)
        .bind(&row.name)
        .bind(row.group_id)
        .bind(row.is_archived)
        .bind(true)
        .bind(scope.admin_id)
        .bind(scope.admin_id)
        .bind(row.created_on)
        .bind(row.modified_on)
        .fetch_one(&mut *conn)
        .await?;
    row_to_upserted(&result)
}

async fn upsert_campaign_event(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &CampaignEventRow,
) -> Result<Upserted, StorageError> {
    // Campaign events carry no org column; scope the lookup through the campaign.
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT e.id FROM campaigns_campaignevent e
         JOIN campaigns_campaign c ON c.id = e.campaign_id
         WHERE c.org_id = $1 AND e.uuid::text = $2 LIMIT 1",
    )
    .bind(scope.org_id)
    .bind(&row.uuid)
    .fetch_optional(&mut *conn)
    .await?;
    let sql = upsert_sql("campaigns_campaignevent", &[
        "uuid",
        "campaign_id",
        "relative_to_id",
        "\"offset\"",
        "unit",
        "delivery_hour",
        "event_type",
        "flow_id",
        "message",
        "start_mode",
        "is_active",
        "created_by_id",
        "modified_by_id",
        "created_on",
        "modified_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(row.campaign_id)
        .bind(row.relative_to_id)
        .bind(row.offset)
        .bind(&row.unit)
        .bind(row.delivery_hour)
        .bind(&row.event_type)
        .bind(row.flow_id)
        .bind(&row.message)
        .bind("I")
        .bind(true)
        .bind(scope.admin_id)
        .bind(scope.admin_id)
        .bind(row.created_on)
        .bind(row.modified_on)
        .fetch_one(&mut *conn)
        .await?;
    row_to_upserted(&result)
}

async fn upsert_flow_start(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &FlowStartRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "flows_flowstart", "uuid", scope.org_id, &row.uuid).await?;
    let sql = upsert_sql("flows_flowstart", &[
        "uuid",
        "org_id",
        "flow_id",
        "status",
        "restart_participants",
        "include_active",
        "extra",
        "created_by_id",
        "created_on",
        "modified_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(scope.org_id)
        .bind(row.flow_id)
        .bind(&row.status)
        .bind(row.restart_participants)
        .bind(row.include_active)
        .bind(&row.extra)
        .bind(scope.admin_id)
        .bind(row.created_on)
        .bind(row.modified_on)
        .fetch_one(&mut *conn)
        .await?;
    let upserted = row_to_upserted(&result)?;
    replace_links(
        conn,
        "flows_flowstart_groups",
        "flowstart_id",
        "contactgroup_id",
        upserted.id,
        &row.group_ids,
    )
    .await?;
    replace_links(
        conn,
        "flows_flowstart_contacts",
        "flowstart_id",
        "contact_id",
        upserted.id,
        &row.contact_ids,
    )
    .await?;
    Ok(upserted)
}

async fn upsert_flow_run(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &FlowRunRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "flows_flowrun", "uuid", scope.org_id, &row.uuid).await?;
    let sql = upsert_sql("flows_flowrun", &[
        "uuid",
        "org_id",
        "flow_id",
        "contact_id",
        "start_id",
        "responded",
        "path",
        "results",
        "status",
        "created_on",
        "modified_on",
        "exited_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(scope.org_id)
        .bind(row.flow_id)
        .bind(row.contact_id)
        .bind(row.start_id)
        .bind(row.responded)
        .bind(&row.path)
        .bind(&row.results)
        .bind(&row.status)
        .bind(row.created_on)
        .bind(row.modified_on)
        .bind(row.exited_on)
        .fetch_one(&mut *conn)
        .await?;
    row_to_upserted(&result)
}

async fn upsert_broadcast(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &BroadcastRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "msgs_broadcast", "uuid", scope.org_id, &row.uuid).await?;
    let sql = upsert_sql("msgs_broadcast", &[
        "uuid",
        "org_id",
        "text",
        "status",
        "is_active",
        "created_by_id",
        "modified_by_id",
        "created_on",
        "modified_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(scope.org_id)
        .bind(&row.text)
        .bind(&row.status)
        .bind(true)
        .bind(scope.admin_id)
        .bind(scope.admin_id)
        .bind(row.created_on)
        .bind(row.modified_on)
        .fetch_one(&mut *conn)
        .await?;
    let upserted = row_to_upserted(&result)?;
    replace_links(
        conn,
        "msgs_broadcast_groups",
        "broadcast_id",
        "contactgroup_id",
        upserted.id,
        &row.group_ids,
    )
    .await?;
    replace_links(
        conn,
        "msgs_broadcast_contacts",
        "broadcast_id",
        "contact_id",
        upserted.id,
        &row.contact_ids,
    )
    .await?;
    replace_links(
        conn,
        "msgs_broadcast_urns",
        "broadcast_id",
        "contacturn_id",
        upserted.id,
        &row.urn_ids,
    )
    .await?;
    Ok(upserted)
}

async fn upsert_message(
    conn: &mut PgConnection,
    scope: WriteScope,
    row: &MessageRow,
) -> Result<Upserted, StorageError> {
    let existing = find_id(conn, "msgs_msg", "uuid", scope.org_id, &row.uuid).await?;
    let sql = upsert_sql("msgs_msg", &[
        "uuid",
        "org_id",
        "contact_id",
        "contact_urn_id",
        "channel_id",
        "broadcast_id",
        "direction",
        "msg_type",
        "status",
        "visibility",
        "text",
        "attachments",
        "created_on",
        "modified_on",
        "sent_on",
    ]);
    let result = sqlx::query(&sql)
        .bind(existing)
        .bind(parse_uuid("uuid", &row.uuid)?)
        .bind(scope.org_id)
        .bind(row.contact_id)
        .bind(row.contact_urn_id)
        .bind(row.channel_id)
        .bind(row.broadcast_id)
        .bind(&row.direction)
        .bind(&row.msg_type)
        .bind(&row.status)
        .bind(&row.visibility)
        .bind(&row.text)
        .bind(&row.attachments)
        .bind(row.created_on)
        .bind(row.modified_on)
        .bind(row.sent_on)
        .fetch_one(&mut *conn)
        .await?;
    let upserted = row_to_upserted(&result)?;
    replace_links(conn, "msgs_msg_labels", "msg_id", "label_id", upserted.id, &row.label_ids)
        .await?;
    Ok(upserted)
}
