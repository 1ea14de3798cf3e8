//! Typed payloads of the source API resources.
//!
//! Importers decode a [`SourceRecord`](temba_migrate_core::SourceRecord) into
//! one of these. Optional and defaulted fields absorb the differences between
//! upstream versions (older installs lack `status` on contacts, name fields
//! `label` instead of `name`, and so on).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Reference to another object, as embedded by the API (`{"uuid": .., "name": ..}`).
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Reference to a contact field (`{"key": .., "name": ..}`).
#[derive(Debug, Clone, Deserialize)]
pub struct FieldRef {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrgPayload {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub primary_language: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub date_style: Option<String>,
    #[serde(default)]
    pub anon: bool,
}

/// Newer upstream versions send `name`/`type`/`featured` next to the
/// deprecated `label`/`value_type`/`pinned`; either spelling is accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldPayload {
    pub key: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default, rename = "type")]
    field_type: Option<String>,
    #[serde(default)]
    value_type: Option<String>,
    #[serde(default)]
    featured: bool,
    #[serde(default)]
    pinned: bool,
}

impl FieldPayload {
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().or(self.label.as_deref()).unwrap_or(&self.key)
    }

    #[must_use]
    pub fn value_type(&self) -> Option<&str> {
        self.field_type.as_deref().or(self.value_type.as_deref())
    }

    #[must_use]
    pub const fn show_in_table(&self) -> bool {
        self.featured || self.pinned
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupPayload {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelPayload {
    pub uuid: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactPayload {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub urns: Vec<String>,
    #[serde(default)]
    pub groups: Vec<ObjectRef>,
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Present from upstream 7.3.58 on; older installs only expose the flags below.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub blocked: Option<bool>,
    #[serde(default)]
    pub stopped: Option<bool>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchivePayload {
    pub archive_type: String,
    pub start_date: NaiveDate,
    pub period: String,
    #[serde(default)]
    pub record_count: i64,
    #[serde(default)]
    pub size: i64,
    pub hash: String,
    /// Older upstream versions call this `download_url`.
    #[serde(alias = "download_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelPayload {
    pub uuid: String,
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub device: Option<Value>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelEventPayload {
    pub id: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub contact: Option<ObjectRef>,
    #[serde(default)]
    pub channel: Option<ObjectRef>,
    #[serde(default)]
    pub extra: Option<Value>,
    #[serde(default)]
    pub occurred_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserPayload {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub role: String,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowResult {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub node_uuids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowPayload {
    pub uuid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub flow_type: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub labels: Vec<ObjectRef>,
    #[serde(default)]
    pub expires: Option<i64>,
    #[serde(default)]
    pub results: Vec<FlowResult>,
    #[serde(default)]
    pub runs: Option<FlowRunTotals>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
}

/// Run counts by exit state, as summarized on each flow.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowRunTotals {
    #[serde(default)]
    pub active: i64,
    #[serde(default)]
    pub completed: i64,
    #[serde(default)]
    pub interrupted: i64,
    #[serde(default)]
    pub expired: i64,
    /// Only reported by newer upstream versions.
    #[serde(default)]
    pub failed: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignPayload {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
    pub group: ObjectRef,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignEventPayload {
    pub uuid: String,
    pub campaign: ObjectRef,
    pub relative_to: FieldRef,
    pub offset: i64,
    pub unit: String,
    #[serde(default = "no_delivery_hour")]
    pub delivery_hour: i64,
    #[serde(default)]
    pub flow: Option<ObjectRef>,
    /// Either a plain string or a language → text map.
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
}

const fn no_delivery_hour() -> i64 {
    -1
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowStartPayload {
    pub uuid: String,
    pub flow: ObjectRef,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub groups: Vec<ObjectRef>,
    #[serde(default)]
    pub contacts: Vec<ObjectRef>,
    #[serde(default = "default_true")]
    pub restart_participants: bool,
    #[serde(default)]
    pub exclude_active: bool,
    #[serde(default)]
    pub extra: Option<Value>,
    /// Deprecated spelling of `extra`.
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunStep {
    pub node: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

/// One flow result of a run. `value` and `input` are usually strings, but
/// group results arrive flattened as `[{name: .., uuid: ..}]` text.
#[derive(Debug, Clone, Deserialize)]
pub struct RunValue {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub input: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowRunPayload {
    pub uuid: String,
    #[serde(default)]
    pub flow: Option<ObjectRef>,
    pub contact: ObjectRef,
    #[serde(default)]
    pub start: Option<ObjectRef>,
    #[serde(default)]
    pub responded: bool,
    #[serde(default)]
    pub path: Vec<RunStep>,
    #[serde(default)]
    pub values: BTreeMap<String, RunValue>,
    #[serde(default)]
    pub exit_type: Option<String>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exited_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastPayload {
    pub id: i64,
    #[serde(default)]
    pub urns: Vec<String>,
    #[serde(default)]
    pub contacts: Vec<ObjectRef>,
    #[serde(default)]
    pub groups: Vec<ObjectRef>,
    /// Either a plain string or a language → text map.
    #[serde(default)]
    pub text: Value,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentPayload {
    pub content_type: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePayload {
    pub id: i64,
    #[serde(default)]
    pub broadcast: Option<i64>,
    #[serde(default)]
    pub contact: Option<ObjectRef>,
    #[serde(default)]
    pub urn: Option<String>,
    #[serde(default)]
    pub channel: Option<ObjectRef>,
    pub direction: String,
    #[serde(default, rename = "type")]
    pub msg_type: Option<String>,
    pub status: String,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub labels: Vec<ObjectRef>,
    #[serde(default)]
    pub attachments: Vec<AttachmentPayload>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sent_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
}
