#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use publication_ingest_core::config::EmitterConfig;
use publication_ingest_core::emitter::BatchEmitter;
use publication_ingest_core::entry::{
    ApprovalRequestEntry, EntryMetadata, MessageEntry, MessageStatus, PublishingRequestEntry,
    ResourceEntry, ResourceStatus, StorageEntry, TicketStatus,
};
use publication_ingest_core::event::{
    EntryResult, EventEntry, EventPublisher, PublishError, PublishResponse,
};
use publication_ingest_core::identifier::{RowVersion, SortableIdentifier};
use publication_ingest_core::record::{EmissionContext, Record};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Scripted,
    AlwaysFailing,
}

/// Publisher double that fails chosen batches a fixed number of times.
///
/// Batches are recognised by the identifier of their first record. Scripted failures
/// reject only the first entry of the batch, the way a throttled bus does.
pub struct ScriptedPublisher {
    mode: Mode,
    remaining_failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<Vec<String>>>,
    details: Mutex<Vec<String>>,
}

impl ScriptedPublisher {
    pub fn accepting() -> Self {
        Self::failing_batches(&[])
    }

    pub fn always_failing() -> Self {
        Self {
            mode: Mode::AlwaysFailing,
            remaining_failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            details: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_batches(plan: &[(&str, usize)]) -> Self {
        Self {
            mode: Mode::Scripted,
            remaining_failures: Mutex::new(
                plan.iter()
                    .map(|(first_id, times)| (first_id.to_string(), *times))
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
            details: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("poisoned mutex").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("poisoned mutex").len()
    }

    /// Every `detail` submitted, in submission order, retries included.
    pub fn details(&self) -> Vec<String> {
        self.details.lock().expect("poisoned mutex").clone()
    }
}

impl EventPublisher for ScriptedPublisher {
    fn put_events(&self, entries: &[EventEntry]) -> Result<PublishResponse, PublishError> {
        let ids: Vec<String> = entries.iter().map(detail_id).collect();
        self.calls.lock().expect("poisoned mutex").push(ids.clone());
        self.details
            .lock()
            .expect("poisoned mutex")
            .extend(entries.iter().map(|entry| entry.detail.clone()));

        if self.mode == Mode::AlwaysFailing {
            return Err(PublishError::new("service unavailable"));
        }

        let should_fail = {
            let mut remaining = self.remaining_failures.lock().expect("poisoned mutex");
            match ids.first().and_then(|first| remaining.get_mut(first)) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    true
                }
                _ => false,
            }
        };

        let results: Vec<EntryResult> = ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                if should_fail && index == 0 {
                    EntryResult::rejected("ThrottlingException", "rate exceeded")
                } else {
                    EntryResult::accepted(format!("event-{id}"))
                }
            })
            .collect();

        Ok(PublishResponse {
            failed_entry_count: usize::from(should_fail),
            entries: results,
        })
    }
}

pub fn detail_id(entry: &EventEntry) -> String {
    let detail: serde_json::Value = serde_json::from_str(&entry.detail).expect("detail is json");
    detail["id"]
        .as_str()
        .or_else(|| detail["identifier"].as_str())
        .expect("detail has id")
        .to_string()
}

pub fn records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|index| {
            let id = format!("r{index}");
            Record::new(id.clone(), json!({ "id": id, "title": format!("Title {index}") }))
        })
        .collect()
}

pub fn emitter<P: EventPublisher>(publisher: P, max_rounds: usize) -> BatchEmitter<P> {
    BatchEmitter::new(
        publisher,
        EmitterConfig {
            max_rounds,
            ..EmitterConfig::default()
        },
        EmissionContext::import("integration-test"),
    )
    .expect("test config is valid")
}

pub fn metadata(identifier: &str, owner: &str, customer: &str) -> EntryMetadata {
    let at = Utc
        .with_ymd_and_hms(2026, 2, 14, 10, 0, 0)
        .single()
        .expect("valid date");
    EntryMetadata {
        identifier: SortableIdentifier::parse(identifier).expect("valid identifier"),
        owner: Some(owner.to_string()),
        customer_id: Some(customer.to_string()),
        created_date: at,
        modified_date: at,
        row_version: RowVersion::from_token("v1"),
    }
}

pub fn resource(identifier: &str, status: ResourceStatus) -> StorageEntry {
    StorageEntry::Resource(ResourceEntry {
        metadata: metadata(identifier, "owner@1", "customer-1"),
        status,
        entity_description: None,
        associated_files: Vec::new(),
    })
}

pub fn publishing_request(
    identifier: &str,
    resource_identifier: &str,
    status: TicketStatus,
) -> StorageEntry {
    StorageEntry::PublishingRequest(PublishingRequestEntry {
        metadata: metadata(identifier, "owner@1", "customer-1"),
        status,
        resource_identifier: SortableIdentifier::parse(resource_identifier)
            .expect("valid identifier"),
        approved_files: Vec::new(),
    })
}

pub fn approval_request(
    identifier: &str,
    resource_identifier: &str,
    status: TicketStatus,
) -> StorageEntry {
    StorageEntry::ApprovalRequest(ApprovalRequestEntry {
        metadata: metadata(identifier, "curator@1", "customer-1"),
        status,
        resource_identifier: SortableIdentifier::parse(resource_identifier)
            .expect("valid identifier"),
        approver: None,
    })
}

pub fn message(identifier: &str, resource_identifier: &str) -> StorageEntry {
    StorageEntry::Message(MessageEntry {
        metadata: metadata(identifier, "owner@1", "customer-1"),
        status: MessageStatus::Unread,
        resource_identifier: SortableIdentifier::parse(resource_identifier)
            .expect("valid identifier"),
        ticket_identifier: None,
        sender: Some("curator@1".to_string()),
        text: "Please add an abstract".to_string(),
    })
}
