use chrono::{TimeZone, Utc};
use serde_json::json;
use temba_migrate_core::EntityType;

use crate::traits::{AttachmentStore, BoundaryStore, ContextStore, RecordStore};
use crate::{
    BoundaryRow, ContactRow, DestinationRecord, GroupRow, LabelRow, MemoryStore, MessageRow,
    OrgSettings, StorageError, UrnRow, UserRow,
};

fn ts() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap()
}

fn group(uuid: &str, name: &str) -> DestinationRecord {
    DestinationRecord::Group(GroupRow {
        uuid: uuid.to_owned(),
        name: name.to_owned(),
        query: None,
        status: "R".to_owned(),
        group_type: "M".to_owned(),
        created_on: ts(),
    })
}

fn contact(uuid: &str, group_ids: Vec<i64>) -> DestinationRecord {
    DestinationRecord::Contact(ContactRow {
        uuid: uuid.to_owned(),
        name: Some("Ann".to_owned()),
        language: None,
        status: "A".to_owned(),
        fields: json!({}),
        group_ids,
        created_on: ts(),
        modified_on: ts(),
        last_seen_on: None,
    })
}

fn message(uuid: &str, contact_id: i64, attachments: &[&str]) -> DestinationRecord {
    DestinationRecord::Message(MessageRow {
        uuid: uuid.to_owned(),
        contact_id,
        contact_urn_id: None,
        channel_id: None,
        broadcast_id: None,
        direction: "I".to_owned(),
        msg_type: "T".to_owned(),
        status: "H".to_owned(),
        visibility: "V".to_owned(),
        text: "hello".to_owned(),
        attachments: attachments.iter().map(|a| (*a).to_owned()).collect(),
        label_ids: Vec::new(),
        created_on: ts(),
        modified_on: ts(),
        sent_on: None,
    })
}

fn boundary(osm_id: &str, level: i32, parent: Option<&str>) -> BoundaryRow {
    BoundaryRow {
        osm_id: osm_id.to_owned(),
        name: format!("Boundary {osm_id}"),
        level,
        parent_osm_id: parent.map(str::to_owned),
        path: format!("Boundary {osm_id}"),
        geometry: None,
    }
}

#[tokio::test]
async fn test_load_context_requires_org_and_admin() {
    let empty = MemoryStore::new();
    assert!(matches!(empty.load_context().await, Err(StorageError::MissingContext("org"))));

    empty.add_org("Org");
    empty.add_user("viewer", false);
    assert!(matches!(empty.load_context().await, Err(StorageError::MissingContext("admin user"))));

    let store = MemoryStore::seeded();
    let scope = store.load_context().await.unwrap();
    assert_ne!(scope.org_id, scope.admin_id);
}

#[tokio::test]
async fn test_upsert_is_keyed_on_natural_key() {
    let store = MemoryStore::seeded();
    let scope = store.load_context().await.unwrap();

    let first = store.upsert(scope, &group("g-1", "Reporters")).await.unwrap();
    assert!(first.created);

    let second = store.upsert(scope, &group("g-1", "Renamed")).await.unwrap();
    assert!(!second.created);
    assert_eq!(first.id, second.id);
    assert_eq!(store.count(EntityType::Group).await.unwrap(), 1);

    match store.row(EntityType::Group, first.id) {
        Some(DestinationRecord::Group(row)) => assert_eq!(row.name, "Renamed"),
        other => panic!("unexpected row {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_reference_is_a_foreign_key_error() {
    let store = MemoryStore::seeded();
    let scope = store.load_context().await.unwrap();

    let err = store.upsert(scope, &contact("c-1", vec![999])).await.unwrap_err();
    assert!(err.is_foreign_key());
    assert_eq!(store.count(EntityType::Contact).await.unwrap(), 0);

    let group_id = store.upsert(scope, &group("g-1", "G")).await.unwrap().id;
    store.upsert(scope, &contact("c-1", vec![group_id])).await.unwrap();
    assert_eq!(store.count(EntityType::Contact).await.unwrap(), 1);
}

#[tokio::test]
async fn test_unknown_scope_is_rejected() {
    let store = MemoryStore::seeded();
    let mut scope = store.load_context().await.unwrap();
    scope.org_id = 4242;
    let err = store.upsert(scope, &group("g-1", "G")).await.unwrap_err();
    assert!(matches!(err, StorageError::ForeignKey { ref target, .. } if target == "org"));
}

#[tokio::test]
async fn test_urn_identity_is_its_key() {
    let store = MemoryStore::seeded();
    let scope = store.load_context().await.unwrap();
    let contact_id = store.upsert(scope, &contact("c-1", vec![])).await.unwrap().id;

    let urn = DestinationRecord::ContactUrn(UrnRow {
        contact_id,
        identity: "tel:+250788123123".to_owned(),
        scheme: "tel".to_owned(),
        path: "+250788123123".to_owned(),
        display: None,
        priority: 1000,
    });
    let first = store.upsert(scope, &urn).await.unwrap();
    let second = store.upsert(scope, &urn).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(store.id_for_key(EntityType::ContactUrn, "tel:+250788123123"), Some(first.id));
}

#[tokio::test]
async fn test_flush_keeps_context_and_boundaries() {
    let store = MemoryStore::seeded();
    let scope = store.load_context().await.unwrap();
    store.add_org("Other org");
    store.add_user("someone", false);
    store.upsert_boundary(&boundary("R1", 0, None)).await.unwrap();

    let group_id = store.upsert(scope, &group("g-1", "G")).await.unwrap().id;
    store.upsert(scope, &contact("c-1", vec![group_id])).await.unwrap();
    store
        .upsert(scope, &DestinationRecord::Label(LabelRow {
            uuid: "l-1".to_owned(),
            name: "Spam".to_owned(),
            created_on: ts(),
        }))
        .await
        .unwrap();

    let removed = store.flush(scope).await.unwrap();
    assert_eq!(removed, 5);
    assert_eq!(store.count(EntityType::Org).await.unwrap(), 1);
    assert_eq!(store.user_count(), 1);
    for entity in [EntityType::Group, EntityType::Contact, EntityType::Label] {
        assert_eq!(store.count(entity).await.unwrap(), 0, "{entity} survived flush");
    }
    assert!(store.boundary("R1").is_some());
    assert_eq!(store.load_context().await.unwrap(), scope);

    // Natural keys are forgotten with the rows.
    assert!(store.upsert(scope, &group("g-1", "G")).await.unwrap().created);
}

fn user(email: &str, role: &str) -> DestinationRecord {
    DestinationRecord::User(UserRow {
        email: email.to_owned(),
        first_name: "Ed".to_owned(),
        last_name: String::new(),
        role: role.to_owned(),
        date_joined: ts(),
    })
}

#[tokio::test]
async fn test_users_are_matched_by_email() {
    let store = MemoryStore::seeded();
    let scope = store.load_context().await.unwrap();

    let first = store.upsert(scope, &user("ed@example.com", "E")).await.unwrap();
    assert!(first.created);
    let second = store.upsert(scope, &user("ed@example.com", "V")).await.unwrap();
    assert!(!second.created);
    assert_eq!(first.id, second.id);
    assert_eq!(store.user_role("ed@example.com", scope.org_id).as_deref(), Some("V"));

    // The admin keeps whatever access it already has.
    let admin = store.upsert(scope, &user("admin", "V")).await.unwrap();
    assert_eq!(admin.id, scope.admin_id);
    assert_eq!(store.user_role("admin", scope.org_id), None);

    assert_eq!(store.flush(scope).await.unwrap(), 1);
    assert_eq!(store.usernames(), vec!["admin"]);
}

#[tokio::test]
async fn test_system_fields_belong_to_their_org() {
    let store = MemoryStore::seeded();
    let scope = store.load_context().await.unwrap();
    let other = store.add_org("Other org");
    let foreign = store.add_system_field(other, "created_on");

    let fields = store.system_fields(scope.org_id).await.unwrap();
    let keys: Vec<&str> = fields.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, ["id", "name", "created_on", "language", "last_seen_on"]);
    assert!(fields.iter().all(|(_, id)| *id != foreign));

    store.flush(scope).await.unwrap();
    assert_eq!(store.system_fields(scope.org_id).await.unwrap(), fields);
    assert!(store.system_fields(other).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_keeps_created_on() {
    let store = MemoryStore::seeded();
    let scope = store.load_context().await.unwrap();
    let id = store.upsert(scope, &group("g-1", "G")).await.unwrap().id;

    let later = DestinationRecord::Group(GroupRow {
        uuid: "g-1".to_owned(),
        name: "Renamed".to_owned(),
        query: None,
        status: "R".to_owned(),
        group_type: "M".to_owned(),
        created_on: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    });
    store.upsert(scope, &later).await.unwrap();
    match store.row(EntityType::Group, id) {
        Some(DestinationRecord::Group(row)) => {
            assert_eq!(row.name, "Renamed");
            assert_eq!(row.created_on, ts());
        },
        other => panic!("unexpected row {other:?}"),
    }
}

#[tokio::test]
async fn test_attachment_batches_skip_empty_messages() {
    let store = MemoryStore::seeded();
    let scope = store.load_context().await.unwrap();
    let contact_id = store.upsert(scope, &contact("c-1", vec![])).await.unwrap().id;

    let m1 = store.upsert(scope, &message("m-1", contact_id, &["image/jpeg:http://a/1.jpg"])).await.unwrap().id;
    store.upsert(scope, &message("m-2", contact_id, &[])).await.unwrap();
    let m3 = store
        .upsert(scope, &message("m-3", contact_id, &["audio/mp3:http://a/2.mp3", "http://a/3"]))
        .await
        .unwrap()
        .id;

    let first = store.attachment_batch(0, 1).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].msg_id, m1);

    let rest = store.attachment_batch(m1, 10).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].msg_id, m3);
    assert_eq!(store.count(EntityType::Attachment).await.unwrap(), 3);

    store.set_attachments(m1, &["image/jpeg:http://b/1.jpg".to_owned()]).await.unwrap();
    assert_eq!(store.attachment_batch(0, 1).await.unwrap()[0].attachments, vec![
        "image/jpeg:http://b/1.jpg".to_owned()
    ]);
    assert!(matches!(
        store.set_attachments(4242, &[]).await,
        Err(StorageError::NotFound { entity: "message", .. })
    ));
}

#[tokio::test]
async fn test_boundary_parent_must_exist() {
    let store = MemoryStore::new();
    let err = store.upsert_boundary(&boundary("R2", 1, Some("R1"))).await.unwrap_err();
    assert!(err.is_foreign_key());

    let country = store.upsert_boundary(&boundary("R1", 0, None)).await.unwrap();
    assert!(country.created);
    store.upsert_boundary(&boundary("R2", 1, Some("R1"))).await.unwrap();
    let again = store.upsert_boundary(&boundary("R1", 0, None)).await.unwrap();
    assert_eq!(again, crate::Upserted { id: country.id, created: false });
}

#[tokio::test]
async fn test_update_org_resolves_country_boundary() {
    let store = MemoryStore::seeded();
    let scope = store.load_context().await.unwrap();
    let country = BoundaryRow { name: "Rwanda".to_owned(), ..boundary("R1", 0, None) };
    let country_id = store.upsert_boundary(&country).await.unwrap().id;

    let settings = OrgSettings {
        uuid: "6a44ca78-a4c2-4862-a7d3-2932f9b3a7c3".to_owned(),
        name: "U-Report".to_owned(),
        timezone: Some("Africa/Kigali".to_owned()),
        date_format: Some("D".to_owned()),
        languages: vec!["eng".to_owned(), "kin".to_owned()],
        country: Some("Rwanda".to_owned()),
        is_anon: false,
    };
    store.update_org(scope.org_id, &settings).await.unwrap();

    let org = store.org(scope.org_id).unwrap();
    assert_eq!(org.settings, settings);
    assert_eq!(org.country_id, Some(country_id));
    assert!(matches!(
        store.update_org(9999, &settings).await,
        Err(StorageError::NotFound { entity: "org", .. })
    ));
}
