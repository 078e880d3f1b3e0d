//! Wire contract between the emitter and the publisher client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batching::EmissionBatch;
use crate::record::{EmissionContext, Record};

/// One entry of a publish request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    pub event_bus_name: String,
    pub resources: Vec<String>,
    pub detail_type: String,
    pub time: DateTime<Utc>,
    pub detail: String,
    pub source: String,
}

/// Per-entry result, aligned by position with the submitted entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntryResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl EntryResult {
    pub fn accepted(event_id: impl Into<String>) -> Self {
        Self {
            event_id: Some(event_id.into()),
            ..Self::default()
        }
    }

    pub fn rejected(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            event_id: None,
            error_code: Some(error_code.into()),
            error_message: Some(error_message.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error_code.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub failed_entry_count: usize,
    #[serde(default)]
    pub entries: Vec<EntryResult>,
}

/// A publish call that did not produce a response at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("publish call failed: {message}")]
pub struct PublishError {
    pub message: String,
}

impl PublishError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Boundary to the message bus: one call per batch.
pub trait EventPublisher: Send + Sync {
    fn put_events(&self, entries: &[EventEntry]) -> Result<PublishResponse, PublishError>;
}

impl<P: EventPublisher + ?Sized> EventPublisher for &P {
    fn put_events(&self, entries: &[EventEntry]) -> Result<PublishResponse, PublishError> {
        (**self).put_events(entries)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedEntry {
    pub record_identifier: String,
    pub error_code: String,
    pub error_message: String,
}

/// Result of submitting one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum EmissionOutcome {
    Accepted {
        batch: EmissionBatch,
    },
    Failed {
        batch: EmissionBatch,
        failed_entries: Vec<FailedEntry>,
    },
}

impl EmissionOutcome {
    pub fn batch(&self) -> &EmissionBatch {
        match self {
            Self::Accepted { batch } | Self::Failed { batch, .. } => batch,
        }
    }

    pub fn into_batch(self) -> EmissionBatch {
        match self {
            Self::Accepted { batch } | Self::Failed { batch, .. } => batch,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn failed_entries(&self) -> &[FailedEntry] {
        match self {
            Self::Accepted { .. } => &[],
            Self::Failed { failed_entries, .. } => failed_entries,
        }
    }

    /// Interprets a publish response for `batch`.
    ///
    /// Failed entries are always drawn from the batch. A response reporting failures it
    /// cannot attribute to positions marks every record of the batch as failed.
    pub fn from_response(batch: EmissionBatch, response: &PublishResponse) -> Self {
        let mut failed_entries: Vec<FailedEntry> = batch
            .records
            .iter()
            .zip(response.entries.iter())
            .filter(|(_, result)| result.is_failure())
            .map(|(record, result)| FailedEntry {
                record_identifier: record.identifier.clone(),
                error_code: result.error_code.clone().unwrap_or_default(),
                error_message: result.error_message.clone().unwrap_or_default(),
            })
            .collect();

        if failed_entries.is_empty() && response.failed_entry_count > 0 {
            failed_entries = whole_batch_failures(
                &batch.records,
                "UnattributedFailure",
                &format!(
                    "{} entries failed without per-entry results",
                    response.failed_entry_count
                ),
            );
        }

        if failed_entries.is_empty() {
            Self::Accepted { batch }
        } else {
            Self::Failed {
                batch,
                failed_entries,
            }
        }
    }

    /// A call that failed outright counts as every entry of the batch failing.
    pub fn from_error(batch: EmissionBatch, error: &PublishError) -> Self {
        let failed_entries =
            whole_batch_failures(&batch.records, "PublishCallFailed", &error.message);
        Self::Failed {
            batch,
            failed_entries,
        }
    }
}

fn whole_batch_failures(records: &[Record], code: &str, message: &str) -> Vec<FailedEntry> {
    records
        .iter()
        .map(|record| FailedEntry {
            record_identifier: record.identifier.clone(),
            error_code: code.to_string(),
            error_message: message.to_string(),
        })
        .collect()
}

/// Serializes a batch into publish entries sharing `context` and `time`.
pub fn build_entries(
    batch: &EmissionBatch,
    context: &EmissionContext,
    event_bus_name: &str,
    time: DateTime<Utc>,
) -> Vec<EventEntry> {
    batch
        .records
        .iter()
        .map(|record| EventEntry {
            event_bus_name: event_bus_name.to_string(),
            resources: vec![context.correlation_token.clone()],
            detail_type: context.detail_type.clone(),
            time,
            detail: record.detail(),
            source: context.source.clone(),
        })
        .collect()
}
