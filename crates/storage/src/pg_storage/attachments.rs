//! AttachmentStore implementation for PgStore.

use async_trait::async_trait;
use sqlx::Row;

use super::PgStore;
use crate::error::StorageError;
use crate::traits::AttachmentStore;
use crate::types::AttachmentRow;

#[async_trait]
impl AttachmentStore for PgStore {
    async fn attachment_batch(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<AttachmentRow>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, attachments FROM msgs_msg
             WHERE id > $1 AND cardinality(attachments) > 0
             ORDER BY id LIMIT $2",
        )
        .bind(after_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(AttachmentRow { msg_id: row.try_get("id")?, attachments: row.try_get("attachments")? })
            })
            .collect()
    }

    async fn set_attachments(
        &self,
        msg_id: i64,
        attachments: &[String],
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE msgs_msg SET attachments = $2 WHERE id = $1")
            .bind(msg_id)
            .bind(attachments)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound { entity: "message", id: msg_id.to_string() });
        }
        Ok(())
    }
}
