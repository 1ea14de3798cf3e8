use std::fmt;

use serde::{Deserialize, Serialize};

/// Every kind of row the importer reads from the source or writes to the destination.
///
/// `Org` is never imported (the destination organization pre-exists) but its
/// source UUID is remapped. `ContactUrn` and `Attachment` have no API resource
/// of their own: URNs arrive embedded in contacts and attachments in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Org,
    Field,
    Group,
    Label,
    Contact,
    ContactUrn,
    Archive,
    Channel,
    ChannelEvent,
    User,
    Flow,
    Campaign,
    CampaignEvent,
    FlowStart,
    FlowRun,
    Broadcast,
    Message,
    Attachment,
}

impl EntityType {
    pub const ALL: [Self; 18] = [
        Self::Org,
        Self::Field,
        Self::Group,
        Self::Label,
        Self::Contact,
        Self::ContactUrn,
        Self::Archive,
        Self::Channel,
        Self::ChannelEvent,
        Self::User,
        Self::Flow,
        Self::Campaign,
        Self::CampaignEvent,
        Self::FlowStart,
        Self::FlowRun,
        Self::Broadcast,
        Self::Message,
        Self::Attachment,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Org => "org",
            Self::Field => "field",
            Self::Group => "group",
            Self::Label => "label",
            Self::Contact => "contact",
            Self::ContactUrn => "contact_urn",
            Self::Archive => "archive",
            Self::Channel => "channel",
            Self::ChannelEvent => "channel_event",
            Self::User => "user",
            Self::Flow => "flow",
            Self::Campaign => "campaign",
            Self::CampaignEvent => "campaign_event",
            Self::FlowStart => "flow_start",
            Self::FlowRun => "flow_run",
            Self::Broadcast => "broadcast",
            Self::Message => "message",
            Self::Attachment => "attachment",
        }
    }

    /// Name of the paginated API resource, `None` for types that are only
    /// ever embedded in another resource.
    #[must_use]
    pub const fn resource(self) -> Option<&'static str> {
        match self {
            Self::Org => Some("org"),
            Self::Field => Some("fields"),
            Self::Group => Some("groups"),
            Self::Label => Some("labels"),
            Self::Contact => Some("contacts"),
            Self::Archive => Some("archives"),
            Self::Channel => Some("channels"),
            Self::ChannelEvent => Some("channel_events"),
            Self::User => Some("users"),
            Self::Flow => Some("flows"),
            Self::Campaign => Some("campaigns"),
            Self::CampaignEvent => Some("campaign_events"),
            Self::FlowStart => Some("flow_starts"),
            Self::FlowRun => Some("runs"),
            Self::Broadcast => Some("broadcasts"),
            Self::Message => Some("messages"),
            Self::ContactUrn | Self::Attachment => None,
        }
    }

    /// JSON key holding the source-native id in this resource's records.
    #[must_use]
    pub const fn id_field(self) -> &'static str {
        match self {
            Self::Field => "key",
            Self::User => "email",
            Self::Archive => "hash",
            Self::ChannelEvent | Self::Broadcast | Self::Message => "id",
            Self::ContactUrn => "identity",
            Self::Attachment => "url",
            Self::Org
            | Self::Group
            | Self::Label
            | Self::Contact
            | Self::Channel
            | Self::Flow
            | Self::Campaign
            | Self::CampaignEvent
            | Self::FlowStart
            | Self::FlowRun => "uuid",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_types_have_no_resource() {
        assert_eq!(EntityType::ContactUrn.resource(), None);
        assert_eq!(EntityType::Attachment.resource(), None);
        assert_eq!(EntityType::ChannelEvent.resource(), Some("channel_events"));
        assert_eq!(EntityType::FlowRun.resource(), Some("runs"));
    }

    #[test]
    fn users_are_identified_by_email() {
        assert_eq!(EntityType::User.resource(), Some("users"));
        assert_eq!(EntityType::User.id_field(), "email");
    }

    #[test]
    fn serde_uses_snake_case_names() {
        for entity in EntityType::ALL {
            let json = serde_json::to_string(&entity).unwrap();
            assert_eq!(json, format!("\"{}\"", entity.as_str()));
        }
    }
}
