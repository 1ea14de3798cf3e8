//! Run-scoped, read-only import configuration.

use temba_migrate_core::{DEFAULT_CHANNEL_TYPE, EntityType, MANUAL_GROUP_TYPE, SourceId};
use temba_migrate_storage::WriteScope;
use uuid::Uuid;

/// Operator choices for one import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Empty the destination before importing.
    pub flush: bool,
    /// Written for every channel; the source API does not expose the real type.
    pub channel_type: String,
    /// Written for every group, for the same reason.
    pub group_type: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            flush: false,
            channel_type: DEFAULT_CHANNEL_TYPE.to_owned(),
            group_type: MANUAL_GROUP_TYPE.to_owned(),
        }
    }
}

/// Everything an importer needs besides the record itself. Built once per
/// run after the destination context is resolved; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ImportContext {
    pub scope: WriteScope,
    pub channel_type: String,
    pub group_type: String,
    namespace: Uuid,
}

impl ImportContext {
    /// `source_base_url` seeds the namespace of derived natural keys, so two
    /// different source instances never collide.
    #[must_use]
    pub fn new(scope: WriteScope, options: &ImportOptions, source_base_url: &str) -> Self {
        Self {
            scope,
            channel_type: options.channel_type.clone(),
            group_type: options.group_type.clone(),
            namespace: Uuid::new_v5(&Uuid::NAMESPACE_URL, source_base_url.as_bytes()),
        }
    }

    /// Deterministic UUID for a source record that exposes none.
    #[must_use]
    pub fn natural_uuid(&self, entity: EntityType, source_id: &SourceId) -> String {
        let resource = entity.resource().unwrap_or(entity.as_str());
        Uuid::new_v5(&self.namespace, format!("{resource}:{source_id}").as_bytes()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> WriteScope {
        WriteScope { org_id: 1, admin_id: 2 }
    }

    #[test]
    fn natural_uuid_is_stable_per_source() {
        let a = ImportContext::new(scope(), &ImportOptions::default(), "https://rapidpro.io");
        let b = ImportContext::new(scope(), &ImportOptions::default(), "https://rapidpro.io");
        let other = ImportContext::new(scope(), &ImportOptions::default(), "https://textit.in");

        let id = SourceId::from(42);
        assert_eq!(
            a.natural_uuid(EntityType::Message, &id),
            b.natural_uuid(EntityType::Message, &id)
        );
        assert_ne!(
            a.natural_uuid(EntityType::Message, &id),
            a.natural_uuid(EntityType::Broadcast, &id)
        );
        assert_ne!(
            a.natural_uuid(EntityType::Message, &id),
            other.natural_uuid(EntityType::Message, &id)
        );
        assert!(Uuid::parse_str(&a.natural_uuid(EntityType::Message, &id)).is_ok());
    }

    #[test]
    fn default_options() {
        let options = ImportOptions::default();
        assert!(!options.flush);
        assert_eq!(options.channel_type, "FBA");
        assert_eq!(options.group_type, "M");
    }

    #[test]
    fn context_carries_configured_types() {
        let options = ImportOptions {
            channel_type: "EX".to_owned(),
            group_type: "Q".to_owned(),
            ..ImportOptions::default()
        };
        let ctx = ImportContext::new(scope(), &options, "https://rapidpro.io");
        assert_eq!(ctx.channel_type, "EX");
        assert_eq!(ctx.group_type, "Q");
    }
}
