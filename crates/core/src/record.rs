use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{EntityType, ValidationError};

/// Source-native identifier. Integer ids are normalized to their decimal form
/// so `123` and `"123"` address the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Accepts JSON strings and integers; anything else is not an id.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_owned())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<i64> for SourceId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

/// Opaque continuation token returned by the source API (the `next` page URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One element of a paginated API response, tagged with its entity type and
/// validated to carry a source id. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    entity: EntityType,
    id: SourceId,
    fields: Map<String, Value>,
}

impl SourceRecord {
    /// Validate a raw API element: it must be a JSON object holding the
    /// entity's id field.
    pub fn from_json(entity: EntityType, value: Value) -> Result<Self, ValidationError> {
        let Value::Object(fields) = value else {
            return Err(ValidationError::new(entity, None, "record is not a JSON object"));
        };
        let id_field = entity.id_field();
        let id = fields.get(id_field).and_then(SourceId::from_json).ok_or_else(|| {
            ValidationError::new(entity, None, format!("missing or empty `{id_field}`"))
        })?;
        Ok(Self { entity, id, fields })
    }

    #[must_use]
    pub const fn entity(&self) -> EntityType {
        self.entity
    }

    #[must_use]
    pub const fn id(&self) -> &SourceId {
        &self.id
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Decode the record into a typed payload. Shape mismatches become
    /// a [`ValidationError`] naming this record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| self.invalid(e.to_string()))
    }

    /// Build a validation error for this record.
    pub fn invalid(&self, reason: impl Into<String>) -> ValidationError {
        ValidationError::new(self.entity, Some(self.id.to_string()), reason)
    }
}
