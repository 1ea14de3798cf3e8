use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::AttachmentRow;

/// Bulk access to stored message attachments.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Messages with at least one attachment and an id above `after_id`,
    /// ascending by id.
    async fn attachment_batch(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<AttachmentRow>, StorageError>;

    /// Replace the attachment list of one message.
    async fn set_attachments(&self, msg_id: i64, attachments: &[String])
    -> Result<(), StorageError>;
}
