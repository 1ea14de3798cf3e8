use async_trait::async_trait;
use chrono::Utc;
use temba_migrate_client::api_types::UserPayload;
use temba_migrate_core::{EntityType, SourceRecord};
use temba_migrate_storage::{DestinationRecord, UserRow};

use super::{EntityImporter, ImportScope};
use crate::choices::{USER_ROLES, code};
use crate::error::ImportError;

/// Source users become destination accounts (username = email) with the same
/// role in the destination organization. Passwords are not exposed, so every
/// imported account starts without a usable one.
pub struct UserImporter;

#[async_trait]
impl EntityImporter for UserImporter {
    fn entity(&self) -> EntityType {
        EntityType::User
    }

    fn provides(&self) -> &'static [EntityType] {
        &[EntityType::User]
    }

    fn depends_on(&self) -> &'static [EntityType] {
        &[]
    }

    async fn import_record(
        &self,
        record: &SourceRecord,
        scope: &mut ImportScope<'_>,
    ) -> Result<(), ImportError> {
        let payload: UserPayload = record.decode()?;
        let row = UserRow {
            email: payload.email.trim().to_owned(),
            first_name: payload.first_name.unwrap_or_default(),
            last_name: payload.last_name.unwrap_or_default(),
            role: code(record, "role", USER_ROLES, &payload.role)?,
            date_joined: payload.created_on.unwrap_or_else(Utc::now),
        };
        scope.write(record.id(), DestinationRecord::User(row)).await?;
        Ok(())
    }
}
