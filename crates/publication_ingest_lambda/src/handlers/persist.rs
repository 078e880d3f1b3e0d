//! Idempotent consumer that writes storage entries delivered as events.
//!
//! Redelivery of an event whose entry is already stored with the same row version is
//! acknowledged without writing. A stored entry with a different row version is left
//! untouched and reported as a conflict.

use publication_ingest_core::entry::StorageEntry;
use publication_ingest_core::identifier::{RowVersion, SortableIdentifier};
use publication_ingest_core::store::{persist_new, EntryStore, StoreError, WriteError};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PersistOutcome {
    Created {
        identifier: SortableIdentifier,
        row_version: RowVersion,
    },
    Duplicate {
        identifier: SortableIdentifier,
    },
    Conflict {
        identifier: SortableIdentifier,
        stored_row_version: Option<RowVersion>,
        delivered_row_version: RowVersion,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("event has no detail")]
    MissingDetail,
    #[error("event detail is not a storage entry: {0}")]
    InvalidEntry(#[source] serde_json::Error),
    #[error(transparent)]
    Write(#[from] WriteError),
}

pub fn handle_persist_event(
    event: &Value,
    store: &impl EntryStore,
) -> Result<PersistOutcome, PersistError> {
    let entry = decode_entry(event)?;

    match persist_new(store, &entry) {
        Ok(item) => {
            tracing::info!(
                entry_type = %item.entry_type,
                identifier = %item.identifier,
                "storage entry persisted"
            );
            Ok(PersistOutcome::Created {
                identifier: item.identifier,
                row_version: item.row_version,
            })
        }
        Err(WriteError::Store(StoreError::AlreadyExists(primary))) => {
            let stored = store
                .get(&primary)
                .map_err(|error| PersistError::Write(WriteError::Store(error)))?;
            let stored_row_version = stored.map(|item| item.row_version);

            if stored_row_version.as_ref() == Some(entry.row_version()) {
                tracing::info!(
                    identifier = %entry.identifier(),
                    "duplicate delivery skipped"
                );
                Ok(PersistOutcome::Duplicate {
                    identifier: entry.identifier().clone(),
                })
            } else {
                tracing::warn!(
                    identifier = %entry.identifier(),
                    key = %primary,
                    delivered_row_version = %entry.row_version(),
                    "stored entry has a different row version; delivery not applied"
                );
                Ok(PersistOutcome::Conflict {
                    identifier: entry.identifier().clone(),
                    stored_row_version,
                    delivered_row_version: entry.row_version().clone(),
                })
            }
        }
        Err(error) => Err(error.into()),
    }
}

/// EventBridge delivers `detail` as an object; a string holding JSON is accepted too.
fn decode_entry(event: &Value) -> Result<StorageEntry, PersistError> {
    let detail = event.get("detail").ok_or(PersistError::MissingDetail)?;
    match detail {
        Value::String(text) => serde_json::from_str(text).map_err(PersistError::InvalidEntry),
        Value::Null => Err(PersistError::MissingDetail),
        other => serde_json::from_value(other.clone()).map_err(PersistError::InvalidEntry),
    }
}
