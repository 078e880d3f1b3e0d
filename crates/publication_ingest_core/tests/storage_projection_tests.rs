mod support;

use std::collections::HashSet;

use publication_ingest_core::entry::{EntryType, ResourceStatus, StorageEntry, TicketStatus};
use publication_ingest_core::keys::{
    customer_status_partition_key, derive_keys, owner_partition_key, resource_partition_key,
    type_sort_prefix,
};
use publication_ingest_core::projection::project;
use publication_ingest_core::store::{
    persist_new, persist_update, EntryStore, InMemoryEntryStore, StoreError, StoreIndex,
    WriteError,
};

use support::{approval_request, message, publishing_request, resource};

#[test]
fn key_derivation_is_repeatable() {
    let entry = publishing_request("T1", "R1", TicketStatus::Pending);
    assert_eq!(
        derive_keys(&entry).expect("keys derive"),
        derive_keys(&entry).expect("keys derive")
    );
}

#[test]
fn same_identifier_in_different_types_never_collides() {
    let entries = [
        resource("X1", ResourceStatus::Draft),
        publishing_request("X1", "R1", TicketStatus::New),
        approval_request("X1", "R1", TicketStatus::New),
        message("X1", "R1"),
    ];

    let primaries: HashSet<_> = entries
        .iter()
        .map(|entry| derive_keys(entry).expect("keys derive").primary)
        .collect();
    assert_eq!(primaries.len(), entries.len());
}

#[test]
fn request_keyed_next_to_its_resource_stays_distinct() {
    let request = derive_keys(&publishing_request("R1", "R1", TicketStatus::Pending))
        .expect("keys derive");
    let resource = derive_keys(&resource("R1", ResourceStatus::Published)).expect("keys derive");

    assert_ne!(request.primary, resource.primary);
    assert_eq!(request.primary.sort_key, "PublishingRequest#R1");
    assert_eq!(resource.primary.sort_key, "Resource#R1");
}

#[test]
fn status_spelling_does_not_change_the_index_partition() {
    let derived = derive_keys(&publishing_request("T1", "R1", TicketStatus::Pending))
        .expect("keys derive")
        .by_customer_status
        .partition_key;

    for spelling in ["Pending", "PENDING", "pending", " Pending "] {
        assert_eq!(
            customer_status_partition_key(EntryType::PublishingRequest, "customer-1", spelling)
                .expect("valid components"),
            derived
        );
    }
    let parsed: TicketStatus = "PENDING".parse().expect("status parses");
    assert_eq!(parsed, TicketStatus::Pending);
}

#[test]
fn stale_writer_gets_concurrent_modification() {
    let store = InMemoryEntryStore::new();
    let original = resource("R1", ResourceStatus::Draft);
    persist_new(&store, &original).expect("create succeeds");

    // Both writers read the same version.
    let read_by_first = original.clone();
    let read_by_second = original.clone();

    let mut first_change = read_by_first.clone();
    if let StorageEntry::Resource(entry) = &mut first_change {
        entry.status = ResourceStatus::Published;
    }
    let stored = persist_update(&store, &read_by_first, &first_change).expect("first update wins");
    assert_ne!(stored.row_version(), original.row_version());

    let mut second_change = read_by_second.clone();
    if let StorageEntry::Resource(entry) = &mut second_change {
        entry.status = ResourceStatus::Deleted;
    }
    let error = persist_update(&store, &read_by_second, &second_change)
        .expect_err("stale update is refused");
    match error {
        WriteError::Store(StoreError::ConcurrentModification { expected, .. }) => {
            assert_eq!(&expected, original.row_version());
        }
        other => panic!("unexpected error: {other}"),
    }

    let primary = derive_keys(&original).expect("keys derive").primary;
    let current = store
        .get(&primary)
        .expect("store reachable")
        .expect("item present");
    assert_eq!(&current.row_version, stored.row_version());
    assert_eq!(current.entry().expect("entry parses"), stored);
}

#[test]
fn identifier_is_stored_once_whatever_the_owner_or_customer() {
    let store = InMemoryEntryStore::new();
    let original = resource("X1", ResourceStatus::Published);
    persist_new(&store, &original).expect("first write succeeds");

    for (owner, customer) in [("owner@2", "customer-1"), ("owner@1", "customer-2")] {
        let mut rival = original.clone();
        if let StorageEntry::Resource(entry) = &mut rival {
            entry.metadata.owner = Some(owner.to_string());
            entry.metadata.customer_id = Some(customer.to_string());
        }
        assert!(matches!(
            persist_new(&store, &rival),
            Err(WriteError::Store(StoreError::AlreadyExists(_)))
        ));
    }

    assert_eq!(store.len(), 1);
    let partition =
        customer_status_partition_key(EntryType::Resource, "customer-1", "Published")
            .expect("valid components");
    let listed: Vec<String> = store
        .query(StoreIndex::ByCustomerStatus, &partition)
        .expect("store reachable")
        .iter()
        .map(|item| item.identifier.as_str().to_string())
        .collect();
    assert_eq!(listed, vec!["X1".to_string()]);
}

#[test]
fn status_change_moves_the_entry_between_status_partitions() {
    let store = InMemoryEntryStore::new();
    let pending = publishing_request("T1", "R1", TicketStatus::Pending);
    persist_new(&store, &pending).expect("create succeeds");

    let mut completed = pending.clone();
    if let StorageEntry::PublishingRequest(entry) = &mut completed {
        entry.status = TicketStatus::Completed;
    }
    persist_update(&store, &pending, &completed).expect("update succeeds");

    let pending_partition =
        customer_status_partition_key(EntryType::PublishingRequest, "customer-1", "Pending")
            .expect("valid components");
    let completed_partition =
        customer_status_partition_key(EntryType::PublishingRequest, "customer-1", "Completed")
            .expect("valid components");

    assert!(store
        .query(StoreIndex::ByCustomerStatus, &pending_partition)
        .expect("store reachable")
        .is_empty());
    assert_eq!(
        store
            .query(StoreIndex::ByCustomerStatus, &completed_partition)
            .expect("store reachable")
            .len(),
        1
    );
}

#[test]
fn resource_index_lists_everything_attached_to_a_resource() {
    let store = InMemoryEntryStore::new();
    for entry in [
        resource("R1", ResourceStatus::Published),
        publishing_request("T2", "R1", TicketStatus::Pending),
        approval_request("T1", "R1", TicketStatus::New),
        message("M1", "R1"),
        message("M2", "R2"),
    ] {
        persist_new(&store, &entry).expect("create succeeds");
    }

    let partition = resource_partition_key("R1").expect("valid component");
    let attached = store
        .query(StoreIndex::ByResource, &partition)
        .expect("store reachable");
    let sort_keys: Vec<&str> = attached
        .iter()
        .map(|item| {
            item.keys
                .by_resource
                .as_ref()
                .expect("attached items have a resource key")
                .sort_key
                .as_str()
        })
        .collect();

    assert_eq!(
        sort_keys,
        vec!["ApprovalRequest#T1", "Message#M1", "PublishingRequest#T2"]
    );
    let messages: Vec<_> = attached
        .iter()
        .filter(|item| {
            item.keys
                .primary
                .sort_key
                .starts_with(&type_sort_prefix(EntryType::Message))
        })
        .collect();
    assert_eq!(messages.len(), 1);
}

#[test]
fn owner_partition_groups_one_type_per_owner() {
    let store = InMemoryEntryStore::new();
    persist_new(&store, &resource("R1", ResourceStatus::Draft)).expect("create succeeds");
    persist_new(&store, &resource("R2", ResourceStatus::Published)).expect("create succeeds");
    persist_new(&store, &publishing_request("T1", "R1", TicketStatus::New))
        .expect("create succeeds");

    let partition = owner_partition_key(EntryType::Resource, "customer-1", "owner@1")
        .expect("valid components");
    let owned = store
        .query(StoreIndex::Primary, &partition)
        .expect("store reachable");
    let identifiers: Vec<&str> = owned.iter().map(|item| item.identifier.as_str()).collect();

    assert_eq!(identifiers, vec!["R1", "R2"]);
}

#[test]
fn projected_item_round_trips_through_the_entry_data() {
    let entry = message("M1", "R1");
    let item = project(&entry).expect("entry projects");

    assert_eq!(item.data["type"], "Message");
    assert_eq!(item.entry().expect("entry parses"), entry);
}
