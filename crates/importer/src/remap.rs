//! Process-scoped translation of source ids to destination ids.

use std::collections::HashMap;

use temba_migrate_core::{EntityType, SourceId};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemapError {
    /// The referenced row was never imported: an ordering defect or missing
    /// upstream data.
    #[error("unresolved {entity} reference {source_id}")]
    UnresolvedReference { entity: EntityType, source_id: SourceId },

    #[error("{entity} {source_id} already maps to {existing}, refusing {attempted}")]
    DuplicateMapping { entity: EntityType, source_id: SourceId, existing: i64, attempted: i64 },
}

/// Write-once map of `(entity type, source id)` to destination id.
#[derive(Debug, Clone, Default)]
pub struct RemapTable {
    entries: HashMap<(EntityType, SourceId), i64>,
}

impl RemapTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping. Writing the identical mapping again is a no-op.
    pub fn put(
        &mut self,
        entity: EntityType,
        source_id: SourceId,
        destination_id: i64,
    ) -> Result<(), RemapError> {
        match self.entries.get(&(entity, source_id.clone())) {
            Some(existing) if *existing == destination_id => Ok(()),
            Some(existing) => Err(RemapError::DuplicateMapping {
                entity,
                source_id,
                existing: *existing,
                attempted: destination_id,
            }),
            None => {
                self.entries.insert((entity, source_id), destination_id);
                Ok(())
            },
        }
    }

    pub fn get(&self, entity: EntityType, source_id: &SourceId) -> Result<i64, RemapError> {
        self.get_optional(entity, source_id).ok_or_else(|| RemapError::UnresolvedReference {
            entity,
            source_id: source_id.clone(),
        })
    }

    /// Lookup for nullable references: absent keys are `None`, not an error.
    #[must_use]
    pub fn get_optional(&self, entity: EntityType, source_id: &SourceId) -> Option<i64> {
        self.entries.get(&(entity, source_id.clone())).copied()
    }

    /// Resolve every id of a required to-many reference.
    pub fn get_all<'a>(
        &self,
        entity: EntityType,
        source_ids: impl IntoIterator<Item = &'a SourceId>,
    ) -> Result<Vec<i64>, RemapError> {
        source_ids.into_iter().map(|id| self.get(entity, id)).collect()
    }

    /// Number of mappings held for one entity type.
    #[must_use]
    pub fn count(&self, entity: EntityType) -> usize {
        self.entries.keys().filter(|(e, _)| *e == entity).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SourceId {
        SourceId::from(s)
    }

    #[test]
    fn put_then_get() {
        let mut remap = RemapTable::new();
        remap.put(EntityType::Contact, id("123"), 41).unwrap();
        assert_eq!(remap.get(EntityType::Contact, &id("123")), Ok(41));
    }

    #[test]
    fn conflicting_put_is_rejected() {
        let mut remap = RemapTable::new();
        remap.put(EntityType::Contact, id("123"), 41).unwrap();
        let err = remap.put(EntityType::Contact, id("123"), 42).unwrap_err();
        assert_eq!(err, RemapError::DuplicateMapping {
            entity: EntityType::Contact,
            source_id: id("123"),
            existing: 41,
            attempted: 42,
        });
        assert_eq!(remap.get(EntityType::Contact, &id("123")), Ok(41));
    }

    #[test]
    fn identical_put_is_tolerated() {
        let mut remap = RemapTable::new();
        remap.put(EntityType::Group, id("g-1"), 7).unwrap();
        remap.put(EntityType::Group, id("g-1"), 7).unwrap();
        assert_eq!(remap.len(), 1);
    }

    #[test]
    fn missing_key() {
        let remap = RemapTable::new();
        assert!(matches!(
            remap.get(EntityType::Contact, &id("999")),
            Err(RemapError::UnresolvedReference { entity: EntityType::Contact, .. })
        ));
        assert_eq!(remap.get_optional(EntityType::Contact, &id("999")), None);
    }

    #[test]
    fn keys_are_scoped_by_entity_type() {
        let mut remap = RemapTable::new();
        remap.put(EntityType::Contact, id("1"), 10).unwrap();
        remap.put(EntityType::Message, id("1"), 20).unwrap();
        assert_eq!(remap.get(EntityType::Message, &id("1")), Ok(20));
        assert_eq!(remap.count(EntityType::Contact), 1);
    }

    #[test]
    fn get_all_fails_on_first_missing() {
        let mut remap = RemapTable::new();
        remap.put(EntityType::Group, id("a"), 1).unwrap();
        remap.put(EntityType::Group, id("b"), 2).unwrap();
        assert_eq!(remap.get_all(EntityType::Group, &[id("a"), id("b")]), Ok(vec![1, 2]));
        assert!(remap.get_all(EntityType::Group, &[id("a"), id("x")]).is_err());
    }
}
