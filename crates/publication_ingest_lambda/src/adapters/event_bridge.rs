use aws_sdk_eventbridge::primitives::DateTime;
use aws_sdk_eventbridge::types::{PutEventsRequestEntry, PutEventsResultEntry};
use publication_ingest_core::event::{
    EntryResult, EventEntry, EventPublisher, PublishError, PublishResponse,
};
use tokio::runtime::Handle;

use super::run_blocking;

/// Publishes entries with one PutEvents call per batch.
#[derive(Clone)]
pub struct EventBridgePublisher {
    client: aws_sdk_eventbridge::Client,
    handle: Handle,
}

impl EventBridgePublisher {
    pub fn new(client: aws_sdk_eventbridge::Client, handle: Handle) -> Self {
        Self { client, handle }
    }
}

impl EventPublisher for EventBridgePublisher {
    fn put_events(&self, entries: &[EventEntry]) -> Result<PublishResponse, PublishError> {
        let request_entries: Vec<PutEventsRequestEntry> =
            entries.iter().map(to_request_entry).collect();
        let client = self.client.clone();

        run_blocking(&self.handle, async move {
            let output = client
                .put_events()
                .set_entries(Some(request_entries))
                .send()
                .await
                .map_err(|error| PublishError::new(format!("PutEvents failed: {error}")))?;

            Ok(PublishResponse {
                failed_entry_count: usize::try_from(output.failed_entry_count()).unwrap_or(0),
                entries: output.entries().iter().map(to_entry_result).collect(),
            })
        })
    }
}

fn to_request_entry(entry: &EventEntry) -> PutEventsRequestEntry {
    PutEventsRequestEntry::builder()
        .event_bus_name(&entry.event_bus_name)
        .set_resources(Some(entry.resources.clone()))
        .detail_type(&entry.detail_type)
        .time(DateTime::from_millis(entry.time.timestamp_millis()))
        .detail(&entry.detail)
        .source(&entry.source)
        .build()
}

fn to_entry_result(entry: &PutEventsResultEntry) -> EntryResult {
    EntryResult {
        event_id: entry.event_id().map(str::to_string),
        error_code: entry.error_code().map(str::to_string),
        error_message: entry.error_message().map(str::to_string),
    }
}
