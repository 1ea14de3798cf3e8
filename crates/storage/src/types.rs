//! Destination-side row shapes.
//!
//! Every foreign key is already a destination id: translating source ids is
//! the importer's job, so nothing in this module knows about the source.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use temba_migrate_core::EntityType;

/// Organization and user every imported row is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteScope {
    pub org_id: i64,
    pub admin_id: i64,
}

/// Result of an upsert: the destination id and whether the row was new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: i64,
    pub created: bool,
}

/// Source organization settings copied onto the destination organization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrgSettings {
    pub uuid: String,
    pub name: String,
    pub timezone: Option<String>,
    /// Single-letter date format code (`D`, `M` or `Y`).
    pub date_format: Option<String>,
    /// Flow languages, primary language first.
    pub languages: Vec<String>,
    /// Country name, resolved against level-0 admin boundaries.
    pub country: Option<String>,
    pub is_anon: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow {
    pub uuid: String,
    pub key: String,
    pub name: String,
    pub value_type: String,
    pub show_in_table: bool,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub uuid: String,
    pub name: String,
    pub query: Option<String>,
    pub status: String,
    pub group_type: String,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelRow {
    pub uuid: String,
    pub name: String,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactRow {
    pub uuid: String,
    pub name: Option<String>,
    pub language: Option<String>,
    pub status: String,
    /// Field values keyed by destination field UUID.
    pub fields: Value,
    pub group_ids: Vec<i64>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
    pub last_seen_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrnRow {
    pub contact_id: i64,
    pub identity: String,
    pub scheme: String,
    pub path: String,
    pub display: Option<String>,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRow {
    pub hash: String,
    pub archive_type: String,
    pub start_date: NaiveDate,
    pub period: String,
    pub record_count: i64,
    pub size: i64,
    pub url: String,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRow {
    pub uuid: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
    pub channel_type: String,
    pub device: Option<String>,
    pub config: Value,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEventRow {
    pub uuid: String,
    pub event_type: String,
    pub channel_id: i64,
    pub contact_id: Option<i64>,
    pub extra: Value,
    pub occurred_on: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
}

/// Source user granted a role in the destination organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    /// Also the destination username.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Organization role code (`A`, `E`, `V`, `T` or `S`).
    pub role: String,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowRow {
    pub uuid: String,
    pub name: String,
    pub flow_type: String,
    pub is_archived: bool,
    pub expires_after_minutes: i32,
    pub metadata: Value,
    pub label_ids: Vec<i64>,
    /// Source run totals keyed by exit type code; replaces the flow's counts.
    pub run_counts: Vec<(String, i64)>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignRow {
    pub uuid: String,
    pub name: String,
    pub group_id: i64,
    pub is_archived: bool,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignEventRow {
    pub uuid: String,
    pub campaign_id: i64,
    pub relative_to_id: i64,
    pub offset: i32,
    pub unit: String,
    pub delivery_hour: i32,
    /// `F` when the event starts a flow, `M` when it sends a message.
    pub event_type: String,
    pub flow_id: Option<i64>,
    pub message: Option<Value>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowStartRow {
    pub uuid: String,
    pub flow_id: i64,
    pub status: String,
    pub restart_participants: bool,
    pub include_active: bool,
    pub extra: Value,
    pub group_ids: Vec<i64>,
    pub contact_ids: Vec<i64>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowRunRow {
    pub uuid: String,
    pub flow_id: i64,
    pub contact_id: i64,
    pub start_id: Option<i64>,
    pub responded: bool,
    /// Visited nodes: `[{"node_uuid", "arrived_on", "exit_uuid"}]`.
    pub path: Value,
    /// Results keyed by result key.
    pub results: Value,
    pub status: String,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
    pub exited_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastRow {
    pub uuid: String,
    /// Translations keyed by language code.
    pub text: Value,
    pub status: String,
    pub group_ids: Vec<i64>,
    pub contact_ids: Vec<i64>,
    pub urn_ids: Vec<i64>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub uuid: String,
    pub contact_id: i64,
    pub contact_urn_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub broadcast_id: Option<i64>,
    pub direction: String,
    pub msg_type: String,
    pub status: String,
    pub visibility: String,
    pub text: String,
    /// `content_type:url` strings.
    pub attachments: Vec<String>,
    pub label_ids: Vec<i64>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
    pub sent_on: Option<DateTime<Utc>>,
}

/// One administrative boundary, upserted by its OSM id.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRow {
    pub osm_id: String,
    pub name: String,
    pub level: i32,
    pub parent_osm_id: Option<String>,
    /// `Country > Province > District` display path.
    pub path: String,
    pub geometry: Option<Value>,
}

/// Attachment list of one stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRow {
    pub msg_id: i64,
    pub attachments: Vec<String>,
}

/// A row ready to be written, tagged by destination table.
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationRecord {
    Field(FieldRow),
    Group(GroupRow),
    Label(LabelRow),
    Contact(ContactRow),
    ContactUrn(UrnRow),
    Archive(ArchiveRow),
    Channel(ChannelRow),
    ChannelEvent(ChannelEventRow),
    User(UserRow),
    Flow(FlowRow),
    Campaign(CampaignRow),
    CampaignEvent(CampaignEventRow),
    FlowStart(FlowStartRow),
    FlowRun(FlowRunRow),
    Broadcast(BroadcastRow),
    Message(MessageRow),
}

impl DestinationRecord {
    #[must_use]
    pub const fn entity(&self) -> EntityType {
        match self {
            Self::Field(_) => EntityType::Field,
            Self::Group(_) => EntityType::Group,
            Self::Label(_) => EntityType::Label,
            Self::Contact(_) => EntityType::Contact,
            Self::ContactUrn(_) => EntityType::ContactUrn,
            Self::Archive(_) => EntityType::Archive,
            Self::Channel(_) => EntityType::Channel,
            Self::ChannelEvent(_) => EntityType::ChannelEvent,
            Self::User(_) => EntityType::User,
            Self::Flow(_) => EntityType::Flow,
            Self::Campaign(_) => EntityType::Campaign,
            Self::CampaignEvent(_) => EntityType::CampaignEvent,
            Self::FlowStart(_) => EntityType::FlowStart,
            Self::FlowRun(_) => EntityType::FlowRun,
            Self::Broadcast(_) => EntityType::Broadcast,
            Self::Message(_) => EntityType::Message,
        }
    }

    /// Value that identifies the row across runs: the upsert key.
    #[must_use]
    pub fn natural_key(&self) -> &str {
        match self {
            Self::Field(r) => &r.key,
            Self::ContactUrn(r) => &r.identity,
            Self::Archive(r) => &r.hash,
            Self::User(r) => &r.email,
            Self::Group(r) => &r.uuid,
            Self::Label(r) => &r.uuid,
            Self::Contact(r) => &r.uuid,
            Self::Channel(r) => &r.uuid,
            Self::ChannelEvent(r) => &r.uuid,
            Self::Flow(r) => &r.uuid,
            Self::Campaign(r) => &r.uuid,
            Self::CampaignEvent(r) => &r.uuid,
            Self::FlowStart(r) => &r.uuid,
            Self::FlowRun(r) => &r.uuid,
            Self::Broadcast(r) => &r.uuid,
            Self::Message(r) => &r.uuid,
        }
    }

    /// Every destination row this row points at.
    #[must_use]
    pub fn references(&self) -> Vec<(EntityType, i64)> {
        fn many(entity: EntityType, ids: &[i64]) -> impl Iterator<Item = (EntityType, i64)> + '_ {
            ids.iter().map(move |id| (entity, *id))
        }

        match self {
            Self::Field(_)
            | Self::Group(_)
            | Self::Label(_)
            | Self::Archive(_)
            | Self::Channel(_)
            | Self::User(_) => Vec::new(),
            Self::Contact(r) => many(EntityType::Group, &r.group_ids).collect(),
            Self::ContactUrn(r) => vec![(EntityType::Contact, r.contact_id)],
            Self::ChannelEvent(r) => std::iter::once((EntityType::Channel, r.channel_id))
                .chain(r.contact_id.map(|id| (EntityType::Contact, id)))
                .collect(),
            Self::Flow(r) => many(EntityType::Label, &r.label_ids).collect(),
            Self::Campaign(r) => vec![(EntityType::Group, r.group_id)],
            Self::CampaignEvent(r) => {
                [(EntityType::Campaign, r.campaign_id), (EntityType::Field, r.relative_to_id)]
                    .into_iter()
                    .chain(r.flow_id.map(|id| (EntityType::Flow, id)))
                    .collect()
            },
            Self::FlowStart(r) => std::iter::once((EntityType::Flow, r.flow_id))
                .chain(many(EntityType::Group, &r.group_ids))
                .chain(many(EntityType::Contact, &r.contact_ids))
                .collect(),
            Self::FlowRun(r) => [(EntityType::Flow, r.flow_id), (EntityType::Contact, r.contact_id)]
                .into_iter()
                .chain(r.start_id.map(|id| (EntityType::FlowStart, id)))
                .collect(),
            Self::Broadcast(r) => many(EntityType::Group, &r.group_ids)
                .chain(many(EntityType::Contact, &r.contact_ids))
                .chain(many(EntityType::ContactUrn, &r.urn_ids))
                .collect(),
            Self::Message(r) => std::iter::once((EntityType::Contact, r.contact_id))
                .chain(r.contact_urn_id.map(|id| (EntityType::ContactUrn, id)))
                .chain(r.channel_id.map(|id| (EntityType::Channel, id)))
                .chain(r.broadcast_id.map(|id| (EntityType::Broadcast, id)))
                .chain(many(EntityType::Label, &r.label_ids))
                .collect(),
        }
    }

    /// Creation timestamp, `None` for rows without one.
    #[must_use]
    pub fn created_on(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Field(r) => Some(r.created_on),
            Self::Group(r) => Some(r.created_on),
            Self::Label(r) => Some(r.created_on),
            Self::Contact(r) => Some(r.created_on),
            Self::Archive(r) => Some(r.created_on),
            Self::Channel(r) => Some(r.created_on),
            Self::ChannelEvent(r) => Some(r.created_on),
            Self::User(r) => Some(r.date_joined),
            Self::Flow(r) => Some(r.created_on),
            Self::Campaign(r) => Some(r.created_on),
            Self::CampaignEvent(r) => Some(r.created_on),
            Self::FlowStart(r) => Some(r.created_on),
            Self::FlowRun(r) => Some(r.created_on),
            Self::Broadcast(r) => Some(r.created_on),
            Self::Message(r) => Some(r.created_on),
            Self::ContactUrn(_) => None,
        }
    }

    /// Carry `previous`'s creation timestamp over, as an update of an
    /// existing row does.
    pub fn keep_created_on(&mut self, previous: &Self) {
        let Some(kept) = previous.created_on() else {
            return;
        };
        let created_on = match self {
            Self::Field(r) => &mut r.created_on,
            Self::Group(r) => &mut r.created_on,
            Self::Label(r) => &mut r.created_on,
            Self::Contact(r) => &mut r.created_on,
            Self::Archive(r) => &mut r.created_on,
            Self::Channel(r) => &mut r.created_on,
            Self::ChannelEvent(r) => &mut r.created_on,
            Self::User(r) => &mut r.date_joined,
            Self::Flow(r) => &mut r.created_on,
            Self::Campaign(r) => &mut r.created_on,
            Self::CampaignEvent(r) => &mut r.created_on,
            Self::FlowStart(r) => &mut r.created_on,
            Self::FlowRun(r) => &mut r.created_on,
            Self::Broadcast(r) => &mut r.created_on,
            Self::Message(r) => &mut r.created_on,
            Self::ContactUrn(_) => return,
        };
        *created_on = kept;
    }
}
