use thiserror::Error;

use crate::EntityType;

/// A source record is missing a required field or carries a value of the wrong shape.
///
/// Always fatal for the run; reported with the entity type and, when known,
/// the source id so the operator can look the record up upstream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {entity} record {}: {reason}", .source_id.as_deref().unwrap_or("<unknown id>"))]
pub struct ValidationError {
    pub entity: EntityType,
    pub source_id: Option<String>,
    pub reason: String,
}

impl ValidationError {
    pub fn new(entity: EntityType, source_id: Option<String>, reason: impl Into<String>) -> Self {
        Self { entity, source_id, reason: reason.into() }
    }
}
