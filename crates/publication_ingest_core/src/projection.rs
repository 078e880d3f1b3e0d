use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::{EntryType, StorageEntry};
use crate::identifier::{RowVersion, SortableIdentifier};
use crate::keys::{derive_keys, uniqueness_key, KeyError, KeyPair, KeySet};
use crate::schema::{
    ATTR_DATA, ATTR_IDENTIFIER, ATTR_PK0, ATTR_PK1, ATTR_PK2, ATTR_ROW_VERSION, ATTR_SK0,
    ATTR_SK1, ATTR_SK2, ATTR_TYPE,
};

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("entry data could not be converted: {0}")]
    Data(#[from] serde_json::Error),
    #[error("stored item has no '{0}' attribute")]
    MissingAttribute(&'static str),
}

/// The flat item persisted for one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalItem {
    pub keys: KeySet,
    pub entry_type: EntryType,
    pub identifier: SortableIdentifier,
    pub row_version: RowVersion,
    pub data: Value,
}

pub fn project(entry: &StorageEntry) -> Result<PhysicalItem, ProjectionError> {
    let keys = derive_keys(entry)?;
    Ok(PhysicalItem {
        keys,
        entry_type: entry.entry_type(),
        identifier: entry.identifier().clone(),
        row_version: entry.row_version().clone(),
        data: serde_json::to_value(entry)?,
    })
}

impl PhysicalItem {
    /// Guard key reserving this item's identifier within its entry type.
    pub fn uniqueness_key(&self) -> KeyPair {
        uniqueness_key(self.entry_type, self.identifier.as_str())
    }

    /// Attribute map as written to the table. The resource index pair is omitted when absent.
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        let mut attributes = BTreeMap::new();
        let mut put = |name: &str, value: Value| {
            attributes.insert(name.to_string(), value);
        };

        put(ATTR_PK0, Value::from(self.keys.primary.partition_key.clone()));
        put(ATTR_SK0, Value::from(self.keys.primary.sort_key.clone()));
        put(
            ATTR_PK1,
            Value::from(self.keys.by_customer_status.partition_key.clone()),
        );
        put(
            ATTR_SK1,
            Value::from(self.keys.by_customer_status.sort_key.clone()),
        );
        if let Some(by_resource) = &self.keys.by_resource {
            put(ATTR_PK2, Value::from(by_resource.partition_key.clone()));
            put(ATTR_SK2, Value::from(by_resource.sort_key.clone()));
        }
        put(ATTR_TYPE, Value::from(self.entry_type.as_str()));
        put(ATTR_IDENTIFIER, Value::from(self.identifier.as_str()));
        put(ATTR_ROW_VERSION, Value::from(self.row_version.as_str()));
        put(ATTR_DATA, self.data.clone());

        attributes
    }

    /// Rebuilds an item from stored attributes; keys are re-derived from `data`.
    pub fn from_attributes(attributes: &BTreeMap<String, Value>) -> Result<Self, ProjectionError> {
        let data = attributes
            .get(ATTR_DATA)
            .ok_or(ProjectionError::MissingAttribute(ATTR_DATA))?;
        let entry: StorageEntry = serde_json::from_value(data.clone())?;
        project(&entry)
    }

    pub fn entry(&self) -> Result<StorageEntry, ProjectionError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}
