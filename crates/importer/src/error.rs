//! Error types of the import pipeline.

use std::fmt;
use std::path::PathBuf;

use temba_migrate_client::ClientError;
use temba_migrate_core::{Cursor, EntityType, SourceId, ValidationError};
use temba_migrate_storage::StorageError;
use thiserror::Error;

use crate::remap::RemapError;

/// Any error that aborts an import, fix-up or geo load.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remap(#[from] RemapError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid boundary file {}: {reason}", path.display())]
    GeoFile { path: PathBuf, reason: String },
}

/// Where an import run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    /// Resolving the destination organization and admin user.
    Setup,
    Flush,
    /// One entity importer (the organization sync reports as [`EntityType::Org`]).
    Entity(EntityType),
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => f.write_str("setup"),
            Self::Flush => f.write_str("flush"),
            Self::Entity(entity) => write!(f, "{entity}"),
        }
    }
}

/// A failed import run, with enough context to resume the investigation.
#[derive(Debug, Error)]
#[error(
    "import failed at {stage} (cursor: {}, record: {}, last completed: {}): {source}",
    display_or(.cursor.as_ref(), "first page"),
    display_or(.source_id.as_ref(), "none"),
    display_or(.last_completed.as_ref(), "none"),
)]
pub struct RunFailure {
    pub stage: RunStage,
    pub cursor: Option<Cursor>,
    pub source_id: Option<SourceId>,
    pub last_completed: Option<EntityType>,
    #[source]
    pub source: ImportError,
}

fn display_or<T: fmt::Display>(value: Option<&T>, fallback: &str) -> String {
    value.map_or_else(|| fallback.to_owned(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_failure_names_stage_cursor_and_last_completed() {
        let failure = RunFailure {
            stage: RunStage::Entity(EntityType::Contact),
            cursor: Some(Cursor::new("https://src/api/v2/contacts.json?cursor=abc")),
            source_id: Some(SourceId::from("c-7")),
            last_completed: Some(EntityType::Label),
            source: RemapError::UnresolvedReference {
                entity: EntityType::Group,
                source_id: SourceId::from("g-9"),
            }
            .into(),
        };
        let msg = failure.to_string();
        assert!(msg.starts_with("import failed at contact"));
        assert!(msg.contains("cursor=abc"));
        assert!(msg.contains("record: c-7"));
        assert!(msg.contains("last completed: label"));
        assert!(msg.contains("g-9"));
    }

    #[test]
    fn run_failure_without_progress() {
        let failure = RunFailure {
            stage: RunStage::Setup,
            cursor: None,
            source_id: None,
            last_completed: None,
            source: StorageError::MissingContext("org").into(),
        };
        let msg = failure.to_string();
        assert!(msg.contains("at setup (cursor: first page, record: none, last completed: none)"));
    }
}
