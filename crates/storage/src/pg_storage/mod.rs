//! PostgreSQL storage backend using sqlx.
//!
//! Writes straight into the destination instance's tables. The schema is
//! owned by the destination application; nothing here creates or migrates it.
//! Split into modular files by domain concern.

mod attachments;
mod boundaries;
mod context;
mod records;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Row};
use temba_migrate_core::{PG_POOL_ACQUIRE_TIMEOUT_SECS, PG_POOL_MAX_CONNECTIONS, env_parse_with_default};
use uuid::Uuid;

use crate::error::StorageError;
use crate::types::Upserted;

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let max_connections = env_parse_with_default(
            "TEMBA_MIGRATE_PG_MAX_CONNECTIONS",
            PG_POOL_MAX_CONNECTIONS,
        );
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(PG_POOL_ACQUIRE_TIMEOUT_SECS))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;
        tracing::info!(max_connections, "PgStore connected");
        Ok(Self { pool })
    }
}

pub(crate) fn parse_uuid(column: &'static str, value: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(value)
        .map_err(|_| StorageError::InvalidValue { column, value: value.to_owned() })
}

/// Builds an insert-or-update keyed on `id`.
///
/// `$1` is the existing id (or NULL to draw a fresh one from the table's
/// sequence); the listed columns follow as `$2..`. An update keeps the row's
/// `created_on`.
pub(crate) fn upsert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders: Vec<String> = (2..columns.len().saturating_add(2)).map(|i| format!("${i}")).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| **c != "created_on")
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();
    format!(
        "INSERT INTO {table} (id, {cols})
         VALUES (COALESCE($1, nextval(pg_get_serial_sequence('{table}', 'id'))), {placeholders})
         ON CONFLICT (id) DO UPDATE SET {updates}
         RETURNING id, (xmax = 0) AS inserted",
        cols = columns.join(", "),
        placeholders = placeholders.join(", "),
        updates = updates.join(", "),
    )
}

pub(crate) fn row_to_upserted(row: &sqlx::postgres::PgRow) -> Result<Upserted, StorageError> {
    Ok(Upserted { id: row.try_get("id")?, created: row.try_get("inserted")? })
}

/// Destination id of the org's row whose `key_column` equals `key`.
pub(crate) async fn find_id(
    conn: &mut PgConnection,
    table: &str,
    key_column: &str,
    org_id: i64,
    key: &str,
) -> Result<Option<i64>, StorageError> {
    let sql = format!("SELECT id FROM {table} WHERE org_id = $1 AND {key_column}::text = $2 LIMIT 1");
    let id = sqlx::query_scalar::<_, i64>(&sql)
        .bind(org_id)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id)
}

/// Replace the many-to-many links of `parent_id` with `child_ids`.
pub(crate) async fn replace_links(
    conn: &mut PgConnection,
    table: &str,
    parent_column: &str,
    child_column: &str,
    parent_id: i64,
    child_ids: &[i64],
) -> Result<(), StorageError> {
    sqlx::query(&format!("DELETE FROM {table} WHERE {parent_column} = $1"))
        .bind(parent_id)
        .execute(&mut *conn)
        .await?;
    if !child_ids.is_empty() {
        sqlx::query(&format!(
            "INSERT INTO {table} ({parent_column}, {child_column})
             SELECT $1, child FROM UNNEST($2::bigint[]) AS child"
        ))
        .bind(parent_id)
        .bind(child_ids)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
