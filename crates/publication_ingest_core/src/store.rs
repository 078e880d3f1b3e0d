//! Write contract for the publication table and the operations built on it.
//!
//! Every mutation is conditional: first writes must not overwrite an existing key and
//! updates must name the row version they were computed from. A first write also reserves
//! the identifier through a guard keyed by type and identifier alone, so the same
//! identifier cannot be stored a second time under another owner or customer.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::entry::StorageEntry;
use crate::identifier::{RowVersion, SortableIdentifier};
use crate::keys::{derive_keys, KeyPair};
use crate::projection::{project, PhysicalItem, ProjectionError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("an entry already exists under {0}")]
    AlreadyExists(KeyPair),
    #[error("entry under {key} was modified concurrently (expected row version {expected})")]
    ConcurrentModification { key: KeyPair, expected: RowVersion },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreIndex {
    Primary,
    ByCustomerStatus,
    ByResource,
}

pub trait EntryStore: Send + Sync {
    /// Writes `item` only if nothing is stored under its primary key and its identifier is
    /// not reserved by another entry of the same type. Both checks and writes are atomic.
    fn put_if_absent(&self, item: &PhysicalItem) -> Result<(), StoreError>;

    /// Replaces the stored item only if its row version still equals `expected`.
    fn put_with_version_check(
        &self,
        item: &PhysicalItem,
        expected: &RowVersion,
    ) -> Result<(), StoreError>;

    fn get(&self, primary: &KeyPair) -> Result<Option<PhysicalItem>, StoreError>;

    /// Deletes the item and releases its identifier reservation.
    fn delete_with_version_check(
        &self,
        primary: &KeyPair,
        guard: &KeyPair,
        expected: &RowVersion,
    ) -> Result<(), StoreError>;

    /// Items stored under `partition_key` of `index`, ordered by sort key.
    fn query(&self, index: StoreIndex, partition_key: &str)
        -> Result<Vec<PhysicalItem>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("update of {identifier} would move it from {previous} to {next}")]
    PrimaryKeyChanged {
        identifier: SortableIdentifier,
        previous: KeyPair,
        next: KeyPair,
    },
}

/// First persistence of an entry. Keys are derived before the store is touched.
pub fn persist_new(
    store: &impl EntryStore,
    entry: &StorageEntry,
) -> Result<PhysicalItem, WriteError> {
    let item = project(entry)?;
    store.put_if_absent(&item)?;
    tracing::debug!(
        entry_type = %item.entry_type,
        identifier = %item.identifier,
        row_version = %item.row_version,
        "entry created"
    );
    Ok(item)
}

/// Persists `updated` over `previous`, returning the entry as stored with its new row version.
///
/// Fails with [`StoreError::ConcurrentModification`] when another writer advanced the row
/// version since `previous` was read. The primary key may not change: owner and customer
/// are fixed for the life of an entry.
pub fn persist_update(
    store: &impl EntryStore,
    previous: &StorageEntry,
    updated: &StorageEntry,
) -> Result<StorageEntry, WriteError> {
    let previous_keys = derive_keys(previous).map_err(ProjectionError::from)?;
    let next = updated.touched(Utc::now());
    let item = project(&next)?;

    if item.keys.primary != previous_keys.primary {
        return Err(WriteError::PrimaryKeyChanged {
            identifier: next.identifier().clone(),
            previous: previous_keys.primary,
            next: item.keys.primary,
        });
    }

    store.put_with_version_check(&item, previous.row_version())?;
    tracing::debug!(
        entry_type = %item.entry_type,
        identifier = %item.identifier,
        previous_row_version = %previous.row_version(),
        row_version = %item.row_version,
        "entry updated"
    );
    Ok(next)
}

pub fn remove(store: &impl EntryStore, entry: &StorageEntry) -> Result<(), WriteError> {
    let item = project(entry)?;
    store.delete_with_version_check(
        &item.keys.primary,
        &item.uniqueness_key(),
        entry.row_version(),
    )?;
    Ok(())
}

#[derive(Debug, Default)]
struct Tables {
    items: BTreeMap<KeyPair, PhysicalItem>,
    /// Identifier reservations, pointing at the primary key that holds them.
    guards: BTreeMap<KeyPair, KeyPair>,
}

/// Process-local store with the same conditional semantics as the table.
#[derive(Debug, Default)]
pub struct InMemoryEntryStore {
    tables: Mutex<Tables>,
}

impl InMemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.items.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

impl EntryStore for InMemoryEntryStore {
    fn put_if_absent(&self, item: &PhysicalItem) -> Result<(), StoreError> {
        let mut tables = self.locked()?;
        let guard = item.uniqueness_key();
        if tables.items.contains_key(&item.keys.primary) || tables.guards.contains_key(&guard) {
            return Err(StoreError::AlreadyExists(item.keys.primary.clone()));
        }
        tables.guards.insert(guard, item.keys.primary.clone());
        tables.items.insert(item.keys.primary.clone(), item.clone());
        Ok(())
    }

    fn put_with_version_check(
        &self,
        item: &PhysicalItem,
        expected: &RowVersion,
    ) -> Result<(), StoreError> {
        let mut tables = self.locked()?;
        match tables.items.get(&item.keys.primary) {
            Some(stored) if &stored.row_version == expected => {
                tables.items.insert(item.keys.primary.clone(), item.clone());
                Ok(())
            }
            _ => Err(StoreError::ConcurrentModification {
                key: item.keys.primary.clone(),
                expected: expected.clone(),
            }),
        }
    }

    fn get(&self, primary: &KeyPair) -> Result<Option<PhysicalItem>, StoreError> {
        Ok(self.locked()?.items.get(primary).cloned())
    }

    fn delete_with_version_check(
        &self,
        primary: &KeyPair,
        guard: &KeyPair,
        expected: &RowVersion,
    ) -> Result<(), StoreError> {
        let mut tables = self.locked()?;
        match tables.items.get(primary) {
            Some(stored) if &stored.row_version == expected => {
                tables.items.remove(primary);
                if tables.guards.get(guard) == Some(primary) {
                    tables.guards.remove(guard);
                }
                Ok(())
            }
            _ => Err(StoreError::ConcurrentModification {
                key: primary.clone(),
                expected: expected.clone(),
            }),
        }
    }

    fn query(
        &self,
        index: StoreIndex,
        partition_key: &str,
    ) -> Result<Vec<PhysicalItem>, StoreError> {
        let tables = self.locked()?;
        let mut matched: Vec<(String, PhysicalItem)> = tables
            .items
            .values()
            .filter_map(|item| {
                let pair = match index {
                    StoreIndex::Primary => Some(&item.keys.primary),
                    StoreIndex::ByCustomerStatus => Some(&item.keys.by_customer_status),
                    StoreIndex::ByResource => item.keys.by_resource.as_ref(),
                }?;
                (pair.partition_key == partition_key).then(|| (pair.sort_key.clone(), item.clone()))
            })
            .collect();
        matched.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(matched.into_iter().map(|(_, item)| item).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::entry::{EntryMetadata, ResourceEntry, ResourceStatus};
    use crate::keys::KeyError;

    use super::*;

    fn with_owner(entry: &StorageEntry, owner: &str) -> StorageEntry {
        let mut moved = entry.clone();
        if let StorageEntry::Resource(resource) = &mut moved {
            resource.metadata.owner = Some(owner.to_string());
        }
        moved
    }

    fn draft(owner: Option<&str>) -> StorageEntry {
        let mut metadata = EntryMetadata::new("owner@1", "customer-1");
        metadata.owner = owner.map(str::to_string);
        StorageEntry::Resource(ResourceEntry {
            metadata,
            status: ResourceStatus::Draft,
            entity_description: None,
            associated_files: Vec::new(),
        })
    }

    #[test]
    fn second_create_of_same_identifier_is_rejected() {
        let store = InMemoryEntryStore::new();
        let entry = draft(Some("owner@1"));

        persist_new(&store, &entry).expect("first write succeeds");
        let error = persist_new(&store, &entry).expect_err("second write fails");

        assert!(matches!(
            error,
            WriteError::Store(StoreError::AlreadyExists(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn same_identifier_under_another_owner_is_rejected() {
        let store = InMemoryEntryStore::new();
        let entry = draft(Some("owner@1"));
        persist_new(&store, &entry).expect("first write succeeds");

        let error =
            persist_new(&store, &with_owner(&entry, "owner@2")).expect_err("identifier is taken");

        assert!(matches!(
            error,
            WriteError::Store(StoreError::AlreadyExists(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn removal_releases_the_identifier() {
        let store = InMemoryEntryStore::new();
        let entry = draft(Some("owner@1"));
        persist_new(&store, &entry).expect("create succeeds");
        remove(&store, &entry).expect("remove succeeds");

        persist_new(&store, &with_owner(&entry, "owner@2")).expect("identifier is free again");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn malformed_entry_never_reaches_the_store() {
        let store = InMemoryEntryStore::new();
        let error = persist_new(&store, &draft(None)).expect_err("owner is required");

        assert!(matches!(
            error,
            WriteError::Projection(ProjectionError::Key(KeyError::MissingKeyComponent {
                field: "owner",
                ..
            }))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn owner_change_is_refused_instead_of_orphaning_the_old_item() {
        let store = InMemoryEntryStore::new();
        let entry = draft(Some("owner@1"));
        persist_new(&store, &entry).expect("create succeeds");

        let moved = with_owner(&entry, "owner@2");

        let error = persist_update(&store, &entry, &moved).expect_err("owner is fixed");
        assert!(matches!(error, WriteError::PrimaryKeyChanged { .. }));
    }

    #[test]
    fn remove_requires_current_row_version() {
        let store = InMemoryEntryStore::new();
        let entry = draft(Some("owner@1"));
        persist_new(&store, &entry).expect("create succeeds");

        let updated = persist_update(&store, &entry, &entry).expect("update succeeds");

        assert!(matches!(
            remove(&store, &entry),
            Err(WriteError::Store(StoreError::ConcurrentModification { .. }))
        ));
        remove(&store, &updated).expect("remove with current version succeeds");
        assert!(store.is_empty());
    }
}
