//! Polymorphic storage entries sharing one physical key space.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identifier::{RowVersion, SortableIdentifier};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} status '{value}'")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a status enumeration that parses case-insensitively and serializes canonically.
macro_rules! entry_status {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownStatus;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let value = value.trim();
                $(
                    if value.eq_ignore_ascii_case($text) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(UnknownStatus {
                    kind: $kind,
                    value: value.to_string(),
                })
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownStatus;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

entry_status!(ResourceStatus, "resource", {
    Draft => "Draft",
    Published => "Published",
    PublishedMetadata => "PublishedMetadata",
    Unpublished => "Unpublished",
    Deleted => "Deleted",
});

entry_status!(TicketStatus, "ticket", {
    New => "New",
    Pending => "Pending",
    Completed => "Completed",
    Closed => "Closed",
    NotApplicable => "NotApplicable",
});

entry_status!(MessageStatus, "message", {
    Unread => "Unread",
    Read => "Read",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Resource,
    DoiRequest,
    PublishingRequest,
    ApprovalRequest,
    Message,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "Resource",
            Self::DoiRequest => "DoiRequest",
            Self::PublishingRequest => "PublishingRequest",
            Self::ApprovalRequest => "ApprovalRequest",
            Self::Message => "Message",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes every entry carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    pub identifier: SortableIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    pub row_version: RowVersion,
}

impl EntryMetadata {
    /// Metadata for a brand new entry created now.
    pub fn new(owner: impl Into<String>, customer_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            identifier: SortableIdentifier::next(),
            owner: Some(owner.into()),
            customer_id: Some(customer_id.into()),
            created_date: now,
            modified_date: now,
            row_version: RowVersion::next(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_title: Option<String>,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_doi: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<Contributor>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssociatedFile {
    pub identifier: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    #[serde(flatten)]
    pub metadata: EntryMetadata,
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_description: Option<EntityDescription>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_files: Vec<AssociatedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoiRequestEntry {
    #[serde(flatten)]
    pub metadata: EntryMetadata,
    pub status: TicketStatus,
    pub resource_identifier: SortableIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishingRequestEntry {
    #[serde(flatten)]
    pub metadata: EntryMetadata,
    pub status: TicketStatus,
    pub resource_identifier: SortableIdentifier,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approved_files: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequestEntry {
    #[serde(flatten)]
    pub metadata: EntryMetadata,
    pub status: TicketStatus,
    pub resource_identifier: SortableIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntry {
    #[serde(flatten)]
    pub metadata: EntryMetadata,
    pub status: MessageStatus,
    pub resource_identifier: SortableIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_identifier: Option<SortableIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub text: String,
}

/// Closed set of record shapes stored in the publication table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StorageEntry {
    Resource(ResourceEntry),
    DoiRequest(DoiRequestEntry),
    PublishingRequest(PublishingRequestEntry),
    ApprovalRequest(ApprovalRequestEntry),
    Message(MessageEntry),
}

impl StorageEntry {
    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Resource(_) => EntryType::Resource,
            Self::DoiRequest(_) => EntryType::DoiRequest,
            Self::PublishingRequest(_) => EntryType::PublishingRequest,
            Self::ApprovalRequest(_) => EntryType::ApprovalRequest,
            Self::Message(_) => EntryType::Message,
        }
    }

    pub fn metadata(&self) -> &EntryMetadata {
        match self {
            Self::Resource(entry) => &entry.metadata,
            Self::DoiRequest(entry) => &entry.metadata,
            Self::PublishingRequest(entry) => &entry.metadata,
            Self::ApprovalRequest(entry) => &entry.metadata,
            Self::Message(entry) => &entry.metadata,
        }
    }

    fn metadata_mut(&mut self) -> &mut EntryMetadata {
        match self {
            Self::Resource(entry) => &mut entry.metadata,
            Self::DoiRequest(entry) => &mut entry.metadata,
            Self::PublishingRequest(entry) => &mut entry.metadata,
            Self::ApprovalRequest(entry) => &mut entry.metadata,
            Self::Message(entry) => &mut entry.metadata,
        }
    }

    pub fn identifier(&self) -> &SortableIdentifier {
        &self.metadata().identifier
    }

    pub fn row_version(&self) -> &RowVersion {
        &self.metadata().row_version
    }

    pub fn status_name(&self) -> &'static str {
        match self {
            Self::Resource(entry) => entry.status.as_str(),
            Self::DoiRequest(entry) => entry.status.as_str(),
            Self::PublishingRequest(entry) => entry.status.as_str(),
            Self::ApprovalRequest(entry) => entry.status.as_str(),
            Self::Message(entry) => entry.status.as_str(),
        }
    }

    /// The resource a ticket or message is attached to. Resources reference nothing.
    pub fn resource_identifier(&self) -> Option<&SortableIdentifier> {
        match self {
            Self::Resource(_) => None,
            Self::DoiRequest(entry) => Some(&entry.resource_identifier),
            Self::PublishingRequest(entry) => Some(&entry.resource_identifier),
            Self::ApprovalRequest(entry) => Some(&entry.resource_identifier),
            Self::Message(entry) => Some(&entry.resource_identifier),
        }
    }

    /// A copy stamped for a new write: fresh row version and modified date.
    pub fn touched(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        let metadata = next.metadata_mut();
        metadata.modified_date = now;
        metadata.row_version = RowVersion::next();
        next
    }
}
