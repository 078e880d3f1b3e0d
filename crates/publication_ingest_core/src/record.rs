use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_EVENT_SOURCE: &str = "publication-ingest.import";
pub const DEFAULT_IMPORT_DETAIL_TYPE: &str = "PublicationService.DataImport.DataEntry";

/// A mapped record ready for emission. The payload is opaque to the emitter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub identifier: String,
    pub payload: Value,
}

impl Record {
    pub fn new(identifier: impl Into<String>, payload: Value) -> Self {
        Self {
            identifier: identifier.into(),
            payload,
        }
    }

    /// JSON text placed in the event `detail` field.
    pub fn detail(&self) -> String {
        self.payload.to_string()
    }
}

/// Attributes shared by every event produced in one emission call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmissionContext {
    pub source: String,
    pub detail_type: String,
    /// Identifier of the invoking context, sent as the event `resources` entry.
    pub correlation_token: String,
}

impl EmissionContext {
    pub fn new(
        source: impl Into<String>,
        detail_type: impl Into<String>,
        correlation_token: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            detail_type: detail_type.into(),
            correlation_token: correlation_token.into(),
        }
    }

    pub fn import(correlation_token: impl Into<String>) -> Self {
        Self::new(
            DEFAULT_EVENT_SOURCE,
            DEFAULT_IMPORT_DETAIL_TYPE,
            correlation_token,
        )
    }
}
