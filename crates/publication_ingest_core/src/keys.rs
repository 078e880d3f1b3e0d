//! Composite key derivation for the single-table layout.
//!
//! ```text
//! primary            PK0 = {type}#Customer#{customerId}#Owner#{owner}
//!                    SK0 = {type}#{identifier}
//! by customer/status PK1 = {type}#Customer#{customerId}#Status#{STATUS}
//!                    SK1 = {type}#{identifier}
//! by resource        PK2 = Resource#{resourceIdentifier}      (tickets and messages only)
//!                    SK2 = {type}#{identifier}
//! uniqueness guard  PK0 = SK0 = UniqueIdentifier#{type}#{identifier}
//! ```
//!
//! Keys are recomputed from the entry on every write and never stored as separate state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entry::{EntryType, StorageEntry};

pub const KEY_DELIMITER: char = '#';

const CUSTOMER_LABEL: &str = "Customer";
const OWNER_LABEL: &str = "Owner";
const STATUS_LABEL: &str = "Status";
const UNIQUENESS_LABEL: &str = "UniqueIdentifier";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("{entry_type} {identifier} is missing key component '{field}'")]
    MissingKeyComponent {
        field: &'static str,
        entry_type: EntryType,
        identifier: String,
    },
    #[error("key component '{field}' contains the key delimiter: '{value}'")]
    DelimiterInComponent { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    pub partition_key: String,
    pub sort_key: String,
}

impl fmt::Display for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.partition_key, self.sort_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySet {
    pub primary: KeyPair,
    pub by_customer_status: KeyPair,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_resource: Option<KeyPair>,
}

pub fn derive_keys(entry: &StorageEntry) -> Result<KeySet, KeyError> {
    let entry_type = entry.entry_type();
    let metadata = entry.metadata();
    let type_name = entry_type.as_str();

    let identifier = checked_component("identifier", metadata.identifier.as_str())?;
    let customer_id = required_component(
        "customerId",
        metadata.customer_id.as_deref(),
        entry_type,
        identifier,
    )?;
    let owner = required_component("owner", metadata.owner.as_deref(), entry_type, identifier)?;
    let status = entry.status_name().to_uppercase();

    let sort_key = join(&[type_name, identifier]);

    let by_resource = match entry.resource_identifier() {
        Some(resource_identifier) => Some(KeyPair {
            partition_key: resource_partition_key(resource_identifier.as_str())?,
            sort_key: sort_key.clone(),
        }),
        None => None,
    };

    Ok(KeySet {
        primary: KeyPair {
            partition_key: join(&[type_name, CUSTOMER_LABEL, customer_id, OWNER_LABEL, owner]),
            sort_key: sort_key.clone(),
        },
        by_customer_status: KeyPair {
            partition_key: join(&[type_name, CUSTOMER_LABEL, customer_id, STATUS_LABEL, &status]),
            sort_key,
        },
        by_resource,
    })
}

/// Key of the guard item that reserves `identifier` for one entry of `entry_type`,
/// whatever its owner or customer.
pub fn uniqueness_key(entry_type: EntryType, identifier: &str) -> KeyPair {
    let key = join(&[UNIQUENESS_LABEL, entry_type.as_str(), identifier]);
    KeyPair {
        partition_key: key.clone(),
        sort_key: key,
    }
}

/// Partition holding every entry of `entry_type` owned by `owner` within a customer.
pub fn owner_partition_key(
    entry_type: EntryType,
    customer_id: &str,
    owner: &str,
) -> Result<String, KeyError> {
    Ok(join(&[
        entry_type.as_str(),
        CUSTOMER_LABEL,
        checked_component("customerId", customer_id)?,
        OWNER_LABEL,
        checked_component("owner", owner)?,
    ]))
}

/// Partition of the customer/status index. `status` is matched case-insensitively.
pub fn customer_status_partition_key(
    entry_type: EntryType,
    customer_id: &str,
    status: &str,
) -> Result<String, KeyError> {
    let status = status.trim().to_uppercase();
    Ok(join(&[
        entry_type.as_str(),
        CUSTOMER_LABEL,
        checked_component("customerId", customer_id)?,
        STATUS_LABEL,
        checked_component("status", &status)?,
    ]))
}

/// Partition of the resource index: every ticket and message attached to one resource.
pub fn resource_partition_key(resource_identifier: &str) -> Result<String, KeyError> {
    Ok(join(&[
        EntryType::Resource.as_str(),
        checked_component("resourceIdentifier", resource_identifier)?,
    ]))
}

/// Sort key prefix selecting one entry type inside a shared partition.
pub fn type_sort_prefix(entry_type: EntryType) -> String {
    format!("{}{KEY_DELIMITER}", entry_type.as_str())
}

fn required_component<'a>(
    field: &'static str,
    value: Option<&'a str>,
    entry_type: EntryType,
    identifier: &str,
) -> Result<&'a str, KeyError> {
    match value {
        Some(value) if !value.trim().is_empty() => checked_component(field, value),
        _ => Err(KeyError::MissingKeyComponent {
            field,
            entry_type,
            identifier: identifier.to_string(),
        }),
    }
}

fn checked_component<'a>(field: &'static str, value: &'a str) -> Result<&'a str, KeyError> {
    if value.contains(KEY_DELIMITER) {
        return Err(KeyError::DelimiterInComponent {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn join(parts: &[&str]) -> String {
    let mut key = String::with_capacity(parts.iter().map(|part| part.len() + 1).sum());
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            key.push(KEY_DELIMITER);
        }
        key.push_str(part);
    }
    key
}
