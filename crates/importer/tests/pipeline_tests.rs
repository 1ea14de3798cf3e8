use std::time::Duration;

use serde_json::{Value, json};
use temba_migrate_client::{ApiClient, ClientConfig, ClientError};
use temba_migrate_core::EntityType;
use temba_migrate_importer::{
    ImportError, ImportOptions, Orchestrator, RemapError, RunStage, RunState,
};
use temba_migrate_storage::traits::ContextStore;
use temba_migrate_storage::{DestinationRecord, MemoryStore, StorageBackend, StorageError};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORG_UUID: &str = "6a44ca78-a4c2-4862-a7d3-2932f9b3a7c3";
const GROUP_UUID: &str = "5fa925e4-edd8-4e2a-ab24-b3dbb5932ddd";
const LABEL_UUID: &str = "fd9f7e49-3b0c-4d6d-9e3a-7e2ea1e8a3a1";
const CONTACT_UUID: &str = "09d23a05-47fe-11e4-bfe9-b8f6b119e9ab";
const FLOW_UUID: &str = "f5901b62-ba76-4003-9c62-72fdacc1b7b7";
const NODE_UUID: &str = "fc32aeb0-ac3e-42a8-9ea7-10248fdf52a1";
const RUN_UUID: &str = "d7a2e4a8-3e3a-4c6f-8a47-4a2a3bfcd2a1";
const EDITOR_EMAIL: &str = "editor@example.com";

fn page(results: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "next": null,
        "previous": null,
        "results": results,
    }))
}

async fn mount_resource(server: &MockServer, resource: &str, results: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v2/{resource}.json")))
        .respond_with(page(results))
        .mount(server)
        .await;
}

/// Org endpoint plus an empty page for every resource not mounted explicitly.
async fn mount_source(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v2/org.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": ORG_UUID,
            "name": "U-Report Rwanda",
            "country": "RW",
            "languages": ["eng", "kin"],
            "primary_language": "kin",
            "timezone": "Africa/Kigali",
            "date_style": "day_first",
            "anon": false,
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v2/[a-z_]+\.json$"))
        .respond_with(page(vec![]))
        .with_priority(10)
        .mount(server)
        .await;
}

async fn mount_dataset(server: &MockServer) {
    mount_resource(
        server,
        "fields",
        vec![json!({"key": "age", "label": "Age", "value_type": "number"})],
    )
    .await;
    mount_resource(
        server,
        "groups",
        vec![
            json!({"uuid": GROUP_UUID, "name": "G1", "query": null, "status": "ready", "count": 1}),
        ],
    )
    .await;
    mount_resource(server, "labels", vec![json!({"uuid": LABEL_UUID, "name": "Important"})]).await;
    mount_resource(
        server,
        "users",
        vec![json!({
            "email": EDITOR_EMAIL,
            "first_name": "Ed",
            "last_name": "Itor",
            "role": "editor",
            "created_on": "2023-02-01T08:00:00.000000Z",
        })],
    )
    .await;
    mount_resource(
        server,
        "contacts",
        vec![json!({
            "uuid": CONTACT_UUID,
            "name": "Ben Haggerty",
            "language": "eng",
            "urns": ["tel:+250788123123"],
            "groups": [{"uuid": GROUP_UUID, "name": "G1"}],
            "fields": {"age": 23},
            "status": "active",
            "created_on": "2024-01-02T08:00:00.000000Z",
            "modified_on": "2024-01-03T08:00:00.000000Z",
        })],
    )
    .await;
    mount_resource(
        server,
        "messages",
        vec![json!({
            "id": 4105426,
            "contact": {"uuid": CONTACT_UUID, "name": "Ben Haggerty"},
            "urn": "tel:+250788123123",
            "direction": "in",
            "type": "text",
            "status": "handled",
            "visibility": "visible",
            "text": "How are you?",
            "labels": [{"uuid": LABEL_UUID, "name": "Important"}],
            "attachments": [
                {"content_type": "image/jpeg", "url": "https://old.example.com/media/1.jpg"},
            ],
            "created_on": "2024-01-04T08:00:00.000000Z",
        })],
    )
    .await;
}

fn client(server: &MockServer) -> ApiClient {
    let config = ClientConfig::new(&server.uri(), "test-key")
        .with_backoff_base(Duration::from_millis(1))
        .with_max_retries(1);
    ApiClient::new(config).unwrap()
}

fn orchestrator(server: &MockServer, store: &MemoryStore, flush: bool) -> Orchestrator {
    let options = ImportOptions { flush, ..ImportOptions::default() };
    Orchestrator::new(client(server), StorageBackend::Memory(store.clone()), options)
}

async fn mount_flow_and_run(server: &MockServer) {
    mount_resource(
        server,
        "flows",
        vec![json!({
            "uuid": FLOW_UUID,
            "name": "Registration",
            "type": "message",
            "archived": false,
            "labels": [],
            "expires": 10080,
            "runs": {"active": 0, "completed": 1, "interrupted": 0, "expired": 2},
            "results": [
                {"key": "color", "name": "Color", "categories": ["Blue", "Other"], "node_uuids": [NODE_UUID]},
            ],
            "created_on": "2024-01-01T08:00:00.000000Z",
        })],
    )
    .await;
    mount_resource(
        server,
        "runs",
        vec![json!({
            "uuid": RUN_UUID,
            "flow": {"uuid": FLOW_UUID, "name": "Registration"},
            "contact": {"uuid": CONTACT_UUID, "name": "Ben Haggerty"},
            "start": null,
            "responded": true,
            "path": [{"node": NODE_UUID, "time": "2024-01-05T08:00:00.000000Z"}],
            "values": {
                "color": {
                    "name": "Color",
                    "value": "blue",
                    "category": "Blue",
                    "node": NODE_UUID,
                    "time": "2024-01-05T08:00:01.000000Z",
                    "input": "blue",
                },
            },
            "exit_type": "completed",
            "exited_on": "2024-01-05T08:00:02.000000Z",
            "created_on": "2024-01-05T08:00:00.000000Z",
            "modified_on": "2024-01-05T08:00:02.000000Z",
        })],
    )
    .await;
}

#[tokio::test]
async fn full_run_remaps_references() {
    let server = MockServer::start().await;
    mount_dataset(&server).await;
    mount_source(&server).await;
    let store = MemoryStore::seeded();

    let mut run = orchestrator(&server, &store, false);
    let report = run.run().await.unwrap();
    assert_eq!(run.state(), RunState::Completed);
    assert_eq!(report.flushed, None);

    let org = store.org(report.scope.org_id).unwrap();
    assert_eq!(org.settings.name, "U-Report Rwanda");
    assert_eq!(org.settings.languages, vec!["kin", "eng"]);

    let group_id = store.id_for_key(EntityType::Group, GROUP_UUID).unwrap();
    let contact_id = store.id_for_key(EntityType::Contact, CONTACT_UUID).unwrap();
    assert_eq!(report.remap.get_optional(EntityType::Group, &GROUP_UUID.into()), Some(group_id));

    let Some(DestinationRecord::Contact(contact)) = store.row(EntityType::Contact, contact_id)
    else {
        panic!("contact not stored");
    };
    assert_eq!(contact.group_ids, vec![group_id]);
    let field_uuid = match store.rows(EntityType::Field).first() {
        Some((_, DestinationRecord::Field(field))) => field.uuid.clone(),
        other => panic!("expected one field, got {other:?}"),
    };
    assert_eq!(contact.fields[&field_uuid]["number"], json!(23));
    assert_eq!(contact.fields[&field_uuid]["text"], json!("23"));

    let urn_id = store.id_for_key(EntityType::ContactUrn, "tel:+250788123123").unwrap();
    let label_id = store.id_for_key(EntityType::Label, LABEL_UUID).unwrap();
    let messages = store.rows(EntityType::Message);
    assert_eq!(messages.len(), 1);
    let DestinationRecord::Message(message) = &messages[0].1 else {
        panic!("expected a message row");
    };
    assert_eq!(message.contact_id, contact_id);
    assert_eq!(message.contact_urn_id, Some(urn_id));
    assert_eq!(message.label_ids, vec![label_id]);
    assert_eq!(message.direction, "I");
    assert_eq!(message.attachments, vec!["image/jpeg:https://old.example.com/media/1.jpg"]);

    assert_eq!(report.stats.get(EntityType::Contact).created, 1);
    assert_eq!(report.stats.get(EntityType::ContactUrn).created, 1);
    assert_eq!(report.stats.get(EntityType::Attachment).fetched, 1);
    assert_eq!(report.stats.get(EntityType::Org).updated, 1);
    assert_eq!(report.stats.get(EntityType::Flow).fetched, 0);
}

#[tokio::test]
async fn rerun_updates_instead_of_duplicating() {
    let server = MockServer::start().await;
    mount_dataset(&server).await;
    mount_source(&server).await;
    let store = MemoryStore::seeded();

    let first = orchestrator(&server, &store, false).run().await.unwrap();
    let second = orchestrator(&server, &store, false).run().await.unwrap();

    for entity in [EntityType::Field, EntityType::Group, EntityType::Contact, EntityType::Message] {
        assert_eq!(store.rows(entity).len(), 1, "{entity} duplicated");
        assert_eq!(second.stats.get(entity).created, 0);
        assert_eq!(second.stats.get(entity).updated, 1);
    }
    assert_eq!(
        first.remap.get_optional(EntityType::Contact, &CONTACT_UUID.into()),
        second.remap.get_optional(EntityType::Contact, &CONTACT_UUID.into()),
    );
}

#[tokio::test]
async fn flush_clears_previous_import() {
    let server = MockServer::start().await;
    mount_dataset(&server).await;
    mount_source(&server).await;
    let store = MemoryStore::seeded();
    store.add_user("leftover", false);

    orchestrator(&server, &store, false).run().await.unwrap();
    let mut run = orchestrator(&server, &store, true);
    let report = run.run().await.unwrap();

    // field, group, label, contact, urn and message rows plus two users
    assert_eq!(report.flushed, Some(8));
    assert_eq!(store.usernames(), vec!["admin"]);
    assert_eq!(report.stats.get(EntityType::Contact).created, 1);
    assert_eq!(store.rows(EntityType::Contact).len(), 1);
}

#[tokio::test]
async fn system_groups_are_skipped() {
    let server = MockServer::start().await;
    mount_resource(
        &server,
        "groups",
        vec![
            json!({"uuid": "a1b2c3d4-0000-4000-8000-000000000001", "name": "Blocked", "status": "ready"}),
            json!({"uuid": GROUP_UUID, "name": "G1", "status": "ready"}),
        ],
    )
    .await;
    mount_source(&server).await;
    let store = MemoryStore::seeded();

    let report = orchestrator(&server, &store, false).run().await.unwrap();
    assert_eq!(store.rows(EntityType::Group).len(), 1);
    assert_eq!(report.stats.get(EntityType::Group).skipped, 1);
    assert_eq!(report.stats.get(EntityType::Group).fetched, 2);
}

#[tokio::test]
async fn unresolved_group_fails_the_contact_stage() {
    let server = MockServer::start().await;
    mount_resource(
        &server,
        "contacts",
        vec![json!({
            "uuid": CONTACT_UUID,
            "name": "Orphan",
            "urns": [],
            "groups": [{"uuid": GROUP_UUID, "name": "G1"}],
            "fields": {},
        })],
    )
    .await;
    mount_source(&server).await;
    let store = MemoryStore::seeded();

    let mut run = orchestrator(&server, &store, false);
    let failure = run.run().await.unwrap_err();
    assert_eq!(run.state(), RunState::Failed);
    assert_eq!(failure.stage, RunStage::Entity(EntityType::Contact));
    assert_eq!(failure.last_completed, Some(EntityType::Label));
    assert_eq!(failure.source_id.as_ref().map(ToString::to_string).as_deref(), Some(CONTACT_UUID));
    assert!(matches!(
        failure.source,
        ImportError::Remap(RemapError::UnresolvedReference { entity: EntityType::Group, .. })
    ));
    assert!(store.rows(EntityType::Contact).is_empty());
}

#[tokio::test]
async fn rejected_credentials_stop_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/fields.json"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid token"))
        .expect(1)
        .mount(&server)
        .await;
    mount_source(&server).await;

    let mut run = orchestrator(&server, &MemoryStore::seeded(), false);
    let failure = run.run().await.unwrap_err();
    assert_eq!(failure.stage, RunStage::Entity(EntityType::Field));
    assert_eq!(failure.last_completed, Some(EntityType::Org));
    assert!(matches!(
        failure.source,
        ImportError::Client(ClientError::Authentication { code: 401, .. })
    ));
}

#[tokio::test]
async fn missing_destination_org_fails_setup() {
    let server = MockServer::start().await;
    mount_source(&server).await;
    let store = MemoryStore::new();
    store.add_user("admin", true);

    let mut run = orchestrator(&server, &store, true);
    let failure = run.run().await.unwrap_err();
    assert_eq!(failure.stage, RunStage::Setup);
    assert_eq!(failure.last_completed, None);
    assert!(matches!(failure.source, ImportError::Storage(StorageError::MissingContext(_))));
}

#[tokio::test]
async fn users_join_the_org_with_their_role() {
    let server = MockServer::start().await;
    mount_dataset(&server).await;
    mount_source(&server).await;
    let store = MemoryStore::seeded();

    let report = orchestrator(&server, &store, false).run().await.unwrap();
    assert_eq!(report.stats.get(EntityType::User).created, 1);
    assert_eq!(store.user_role(EDITOR_EMAIL, report.scope.org_id).as_deref(), Some("E"));
    assert_eq!(store.user_role("admin", report.scope.org_id), None);

    let again = orchestrator(&server, &store, false).run().await.unwrap();
    assert_eq!(again.stats.get(EntityType::User).updated, 1);
    assert_eq!(store.user_count(), 2);
}

#[tokio::test]
async fn campaign_events_resolve_system_fields() {
    let server = MockServer::start().await;
    mount_resource(
        &server,
        "groups",
        vec![json!({"uuid": GROUP_UUID, "name": "G1", "status": "ready"})],
    )
    .await;
    mount_resource(
        &server,
        "campaigns",
        vec![json!({
            "uuid": "c1e5f8a2-7a2b-4c55-9a3f-5a1f2b9d6e01",
            "name": "Reminders",
            "archived": false,
            "group": {"uuid": GROUP_UUID, "name": "G1"},
        })],
    )
    .await;
    mount_resource(
        &server,
        "campaign_events",
        vec![json!({
            "uuid": "e2a1c3b4-5d6e-4f70-8a9b-0c1d2e3f4a5b",
            "campaign": {"uuid": "c1e5f8a2-7a2b-4c55-9a3f-5a1f2b9d6e01", "name": "Reminders"},
            "relative_to": {"key": "created_on", "name": "Created On"},
            "offset": 1,
            "unit": "days",
            "delivery_hour": -1,
            "flow": null,
            "message": {"eng": "Welcome back"},
        })],
    )
    .await;
    mount_source(&server).await;
    let store = MemoryStore::seeded();

    let report = orchestrator(&server, &store, false).run().await.unwrap();
    let created_on_field = store
        .system_fields(report.scope.org_id)
        .await
        .unwrap()
        .into_iter()
        .find(|(key, _)| key == "created_on")
        .map(|(_, id)| id)
        .unwrap();
    let events = store.rows(EntityType::CampaignEvent);
    assert_eq!(events.len(), 1);
    let DestinationRecord::CampaignEvent(event) = &events[0].1 else {
        panic!("expected a campaign event row");
    };
    assert_eq!(event.relative_to_id, created_on_field);
    assert_eq!(event.event_type, "M");
    assert!(store.rows(EntityType::Field).is_empty());
}

#[tokio::test]
async fn flow_runs_follow_flows_and_contacts() {
    let server = MockServer::start().await;
    mount_dataset(&server).await;
    mount_flow_and_run(&server).await;
    mount_source(&server).await;
    let store = MemoryStore::seeded();

    let report = orchestrator(&server, &store, false).run().await.unwrap();
    assert_eq!(report.stats.get(EntityType::FlowRun).created, 1);

    let flow_id = store.id_for_key(EntityType::Flow, FLOW_UUID).unwrap();
    let contact_id = store.id_for_key(EntityType::Contact, CONTACT_UUID).unwrap();
    let Some(DestinationRecord::Flow(flow)) = store.row(EntityType::Flow, flow_id) else {
        panic!("flow not stored");
    };
    assert_eq!(flow.run_counts, vec![
        ("C".to_owned(), 1),
        ("I".to_owned(), 0),
        ("E".to_owned(), 2),
    ]);

    let runs = store.rows(EntityType::FlowRun);
    assert_eq!(runs.len(), 1);
    let DestinationRecord::FlowRun(run) = &runs[0].1 else {
        panic!("expected a flow run row");
    };
    assert_eq!(run.flow_id, flow_id);
    assert_eq!(run.contact_id, contact_id);
    assert_eq!(run.start_id, None);
    assert_eq!(run.status, "C");
    assert!(run.responded);
    assert_eq!(run.results["color"]["node_uuid"], json!(NODE_UUID));
    assert_eq!(run.results["color"]["category"], json!("Blue"));
    assert_eq!(run.path[0]["node_uuid"], json!(NODE_UUID));
    assert_eq!(run.path[0]["exit_uuid"], Value::Null);
}

#[tokio::test]
async fn flow_run_of_unknown_contact_fails() {
    let server = MockServer::start().await;
    mount_flow_and_run(&server).await;
    mount_source(&server).await;
    let store = MemoryStore::seeded();

    let failure = orchestrator(&server, &store, false).run().await.unwrap_err();
    assert_eq!(failure.stage, RunStage::Entity(EntityType::FlowRun));
    assert_eq!(failure.last_completed, Some(EntityType::FlowStart));
    assert!(matches!(
        failure.source,
        ImportError::Remap(RemapError::UnresolvedReference { entity: EntityType::Contact, .. })
    ));
}

#[tokio::test]
async fn rerun_keeps_creation_timestamps() {
    let server = MockServer::start().await;
    mount_dataset(&server).await;
    mount_source(&server).await;
    let store = MemoryStore::seeded();

    orchestrator(&server, &store, false).run().await.unwrap();
    let before = store.rows(EntityType::Group);
    tokio::time::sleep(Duration::from_millis(5)).await;
    orchestrator(&server, &store, false).run().await.unwrap();
    let after = store.rows(EntityType::Group);

    let (Some((_, DestinationRecord::Group(before))), Some((_, DestinationRecord::Group(after)))) =
        (before.first(), after.first())
    else {
        panic!("expected one group");
    };
    assert_eq!(before.created_on, after.created_on);
}

#[tokio::test]
async fn configured_group_type_is_written() {
    let server = MockServer::start().await;
    mount_dataset(&server).await;
    mount_source(&server).await;
    let store = MemoryStore::seeded();

    let options = ImportOptions { group_type: "Q".to_owned(), ..ImportOptions::default() };
    Orchestrator::new(client(&server), StorageBackend::Memory(store.clone()), options)
        .run()
        .await
        .unwrap();
    match store.rows(EntityType::Group).first() {
        Some((_, DestinationRecord::Group(group))) => assert_eq!(group.group_type, "Q"),
        other => panic!("expected one group, got {other:?}"),
    }
}
