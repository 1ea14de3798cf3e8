//! In-memory destination backend.
//!
//! Mirrors the PostgreSQL backend's contract (natural-key upserts, enforced
//! foreign keys, flush semantics) so imports can be dry-run and tested
//! without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use temba_migrate_core::{EntityType, SYSTEM_FIELD_KEYS};

use crate::error::StorageError;
use crate::traits::{AttachmentStore, BoundaryStore, ContextStore, RecordStore};
use crate::types::{
    AttachmentRow, BoundaryRow, DestinationRecord, OrgSettings, Upserted, UserRow, WriteScope,
};

/// Organization as held by the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOrg {
    pub settings: OrgSettings,
    pub country_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
struct StoredUser {
    username: String,
    first_name: String,
    last_name: String,
    is_superuser: bool,
    /// Role code per organization id.
    roles: BTreeMap<i64, String>,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    orgs: BTreeMap<i64, StoredOrg>,
    users: BTreeMap<i64, StoredUser>,
    rows: BTreeMap<EntityType, BTreeMap<i64, DestinationRecord>>,
    keys: HashMap<(EntityType, String), i64>,
    /// System contact fields: id → (org id, key).
    system_fields: BTreeMap<i64, (i64, String)>,
    boundaries: BTreeMap<String, (i64, BoundaryRow)>,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id = self.next_id.saturating_add(1);
        self.next_id
    }

    fn exists(&self, entity: EntityType, id: i64) -> bool {
        self.rows.get(&entity).is_some_and(|rows| rows.contains_key(&id))
            || (entity == EntityType::Field && self.system_fields.contains_key(&id))
    }

    /// Get-or-create by username; the admin keeps its own role.
    fn upsert_user(&mut self, scope: WriteScope, row: &UserRow) -> Upserted {
        let existing = self.users.iter().find(|(_, u)| u.username == row.email).map(|(id, _)| *id);
        let (id, created) = match existing {
            Some(id) => (id, false),
            None => {
                let id = self.allocate_id();
                let user = StoredUser { username: row.email.clone(), ..StoredUser::default() };
                self.users.insert(id, user);
                (id, true)
            },
        };
        if let Some(user) = self.users.get_mut(&id) {
            user.first_name.clone_from(&row.first_name);
            user.last_name.clone_from(&row.last_name);
            if id != scope.admin_id {
                user.roles.insert(scope.org_id, row.role.clone());
            }
        }
        Upserted { id, created }
    }

    fn check_scope(&self, scope: WriteScope) -> Result<(), StorageError> {
        if !self.orgs.contains_key(&scope.org_id) {
            return Err(StorageError::ForeignKey {
                target: "org".to_owned(),
                id: scope.org_id.to_string(),
            });
        }
        if !self.users.contains_key(&scope.admin_id) {
            return Err(StorageError::ForeignKey {
                target: "user".to_owned(),
                id: scope.admin_id.to_string(),
            });
        }
        Ok(())
    }
}

/// Cloneable handle; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Empty destination: no organization, no users.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination with one organization, its system fields and one admin,
    /// as left by the destination frontend's signup.
    #[must_use]
    pub fn seeded() -> Self {
        let store = Self::new();
        let org_id = store.add_org("Destination");
        store.add_user("admin", true);
        for key in SYSTEM_FIELD_KEYS {
            store.add_system_field(org_id, key);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_org(&self, name: &str) -> i64 {
        let mut state = self.lock();
        let id = state.allocate_id();
        let settings = OrgSettings { name: name.to_owned(), ..OrgSettings::default() };
        state.orgs.insert(id, StoredOrg { settings, country_id: None });
        id
    }

    pub fn add_user(&self, username: &str, is_superuser: bool) -> i64 {
        let mut state = self.lock();
        let id = state.allocate_id();
        let user = StoredUser { username: username.to_owned(), is_superuser, ..StoredUser::default() };
        state.users.insert(id, user);
        id
    }

    pub fn add_system_field(&self, org_id: i64, key: &str) -> i64 {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.system_fields.insert(id, (org_id, key.to_owned()));
        id
    }

    /// Role code of `username` in the organization, if it has one.
    #[must_use]
    pub fn user_role(&self, username: &str, org_id: i64) -> Option<String> {
        self.lock()
            .users
            .values()
            .find(|u| u.username == username)
            .and_then(|u| u.roles.get(&org_id).cloned())
    }

    #[must_use]
    pub fn org(&self, id: i64) -> Option<StoredOrg> {
        self.lock().orgs.get(&id).cloned()
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    #[must_use]
    pub fn usernames(&self) -> Vec<String> {
        self.lock().users.values().map(|u| u.username.clone()).collect()
    }

    /// Stored rows of one type, ascending by id.
    #[must_use]
    pub fn rows(&self, entity: EntityType) -> Vec<(i64, DestinationRecord)> {
        self.lock()
            .rows
            .get(&entity)
            .map(|rows| rows.iter().map(|(id, row)| (*id, row.clone())).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn row(&self, entity: EntityType, id: i64) -> Option<DestinationRecord> {
        self.lock().rows.get(&entity).and_then(|rows| rows.get(&id)).cloned()
    }

    /// Destination id of the row with the given natural key.
    #[must_use]
    pub fn id_for_key(&self, entity: EntityType, key: &str) -> Option<i64> {
        self.lock().keys.get(&(entity, key.to_owned())).copied()
    }

    #[must_use]
    pub fn boundary(&self, osm_id: &str) -> Option<(i64, BoundaryRow)> {
        self.lock().boundaries.get(osm_id).cloned()
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn load_context(&self) -> Result<WriteScope, StorageError> {
        let state = self.lock();
        let org_id = state.orgs.keys().next().copied().ok_or(StorageError::MissingContext("org"))?;
        let admin_id = state
            .users
            .iter()
            .find(|(_, user)| user.is_superuser)
            .map(|(id, _)| *id)
            .ok_or(StorageError::MissingContext("admin user"))?;
        Ok(WriteScope { org_id, admin_id })
    }

    async fn system_fields(&self, org_id: i64) -> Result<Vec<(String, i64)>, StorageError> {
        Ok(self
            .lock()
            .system_fields
            .iter()
            .filter(|(_, (org, _))| *org == org_id)
            .map(|(id, (_, key))| (key.clone(), *id))
            .collect())
    }

    async fn update_org(&self, org_id: i64, settings: &OrgSettings) -> Result<(), StorageError> {
        let mut state = self.lock();
        let country_id = settings.country.as_deref().and_then(|country| {
            state
                .boundaries
                .values()
                .find(|(_, b)| b.level == 0 && b.name == country)
                .map(|(id, _)| *id)
        });
        let org = state
            .orgs
            .get_mut(&org_id)
            .ok_or_else(|| StorageError::NotFound { entity: "org", id: org_id.to_string() })?;
        org.settings = settings.clone();
        org.country_id = country_id;
        Ok(())
    }

    async fn flush(&self, keep: WriteScope) -> Result<u64, StorageError> {
        let mut state = self.lock();
        let rows: usize = state.rows.values().map(BTreeMap::len).sum();
        let orgs_before = state.orgs.len();
        let users_before = state.users.len();

        state.rows.clear();
        state.keys.clear();
        state.orgs.retain(|id, _| *id == keep.org_id);
        state.users.retain(|id, _| *id == keep.admin_id);
        state.system_fields.retain(|_, (org_id, _)| *org_id == keep.org_id);

        let removed = rows
            .saturating_add(orgs_before.saturating_sub(state.orgs.len()))
            .saturating_add(users_before.saturating_sub(state.users.len()));
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn count(&self, entity: EntityType) -> Result<u64, StorageError> {
        let state = self.lock();
        let count = match entity {
            EntityType::Org => state.orgs.len(),
            EntityType::User => state.users.len(),
            EntityType::Attachment => state
                .rows
                .get(&EntityType::Message)
                .map(|rows| {
                    rows.values()
                        .map(|row| match row {
                            DestinationRecord::Message(msg) => msg.attachments.len(),
                            _ => 0,
                        })
                        .sum()
                })
                .unwrap_or(0),
            other => state.rows.get(&other).map_or(0, BTreeMap::len),
        };
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert(
        &self,
        scope: WriteScope,
        record: &DestinationRecord,
    ) -> Result<Upserted, StorageError> {
        let mut state = self.lock();
        state.check_scope(scope)?;
        for (entity, id) in record.references() {
            if !state.exists(entity, id) {
                return Err(StorageError::ForeignKey {
                    target: entity.to_string(),
                    id: id.to_string(),
                });
            }
        }

        if let DestinationRecord::User(row) = record {
            return Ok(state.upsert_user(scope, row));
        }

        let entity = record.entity();
        let key = (entity, record.natural_key().to_owned());
        let (id, created) = match state.keys.get(&key) {
            Some(id) => (*id, false),
            None => {
                let id = state.allocate_id();
                state.keys.insert(key, id);
                (id, true)
            },
        };
        let rows = state.rows.entry(entity).or_default();
        let mut row = record.clone();
        if let Some(previous) = rows.get(&id) {
            row.keep_created_on(previous);
        }
        rows.insert(id, row);
        Ok(Upserted { id, created })
    }
}

#[async_trait]
impl AttachmentStore for MemoryStore {
    async fn attachment_batch(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<AttachmentRow>, StorageError> {
        let state = self.lock();
        let Some(messages) = state.rows.get(&EntityType::Message) else {
            return Ok(Vec::new());
        };
        Ok(messages
            .range(after_id.saturating_add(1)..)
            .filter_map(|(id, row)| match row {
                DestinationRecord::Message(msg) if !msg.attachments.is_empty() => {
                    Some(AttachmentRow { msg_id: *id, attachments: msg.attachments.clone() })
                },
                _ => None,
            })
            .take(limit)
            .collect())
    }

    async fn set_attachments(
        &self,
        msg_id: i64,
        attachments: &[String],
    ) -> Result<(), StorageError> {
        let mut state = self.lock();
        match state.rows.get_mut(&EntityType::Message).and_then(|rows| rows.get_mut(&msg_id)) {
            Some(DestinationRecord::Message(msg)) => {
                msg.attachments = attachments.to_vec();
                Ok(())
            },
            _ => Err(StorageError::NotFound { entity: "message", id: msg_id.to_string() }),
        }
    }
}

#[async_trait]
impl BoundaryStore for MemoryStore {
    async fn upsert_boundary(&self, boundary: &BoundaryRow) -> Result<Upserted, StorageError> {
        let mut state = self.lock();
        if let Some(parent) = &boundary.parent_osm_id
            && !state.boundaries.contains_key(parent)
        {
            return Err(StorageError::ForeignKey {
                target: "admin boundary".to_owned(),
                id: parent.clone(),
            });
        }
        let (id, created) = match state.boundaries.get(&boundary.osm_id) {
            Some((id, _)) => (*id, false),
            None => (state.allocate_id(), true),
        };
        state.boundaries.insert(boundary.osm_id.clone(), (id, boundary.clone()));
        Ok(Upserted { id, created })
    }
}
