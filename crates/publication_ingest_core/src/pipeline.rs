//! Composition of mapping and emission shared by every inbound path.
//!
//! A bulk listing and a single notification both arrive here as raw legacy values;
//! mapping to canonical records is delegated to a [`RecordMapper`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::emitter::{BatchEmitter, EmissionReport};
use crate::entry::StorageEntry;
use crate::event::EventPublisher;
use crate::keys::{derive_keys, KeyError};
use crate::record::Record;

pub const DEFAULT_IDENTIFIER_FIELD: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("line {line}: invalid JSON: {message}")]
    InvalidJson { line: usize, message: String },
    #[error("line {line}: invalid UTF-8: {message}")]
    InvalidUtf8 { line: usize, message: String },
    #[error("value is not a storage entry: {0}")]
    InvalidEntry(String),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("record has no usable '{field}' identifier")]
    MissingIdentifier { field: String },
    #[error("{0}")]
    Rejected(String),
}

/// Boundary to the domain mapping from legacy values to canonical records.
pub trait RecordMapper {
    fn map_record(&self, raw: &Value) -> Result<Record, MappingError>;
}

/// Keeps the legacy value as payload and takes the identifier from one top-level field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonFieldMapper {
    identifier_field: String,
}

impl JsonFieldMapper {
    pub fn new(identifier_field: impl Into<String>) -> Self {
        Self {
            identifier_field: identifier_field.into(),
        }
    }
}

impl Default for JsonFieldMapper {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTIFIER_FIELD)
    }
}

impl RecordMapper for JsonFieldMapper {
    fn map_record(&self, raw: &Value) -> Result<Record, MappingError> {
        let identifier = match raw.get(&self.identifier_field) {
            Some(Value::String(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Some(Value::Number(number)) => number.to_string(),
            _ => {
                return Err(MappingError::MissingIdentifier {
                    field: self.identifier_field.clone(),
                })
            }
        };
        Ok(Record::new(identifier, raw.clone()))
    }
}

/// Reads each value as a [`StorageEntry`] and derives its keys before anything is emitted,
/// so an entry the table would refuse never reaches the bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageEntryMapper;

impl RecordMapper for StorageEntryMapper {
    fn map_record(&self, raw: &Value) -> Result<Record, MappingError> {
        let entry: StorageEntry = serde_json::from_value(raw.clone())
            .map_err(|error| MappingError::InvalidEntry(error.to_string()))?;
        derive_keys(&entry)?;
        let payload = serde_json::to_value(&entry)
            .map_err(|error| MappingError::InvalidEntry(error.to_string()))?;
        Ok(Record::new(entry.identifier().as_str(), payload))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingFailure {
    /// 1-based position of the value in its source.
    pub position: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// Parses newline-delimited JSON. Blank lines are skipped; lines that are not valid UTF-8
/// or not valid JSON are reported and never rewritten.
pub fn parse_json_lines(body: &[u8]) -> (Vec<(usize, Value)>, Vec<MappingFailure>) {
    let mut values = Vec::new();
    let mut failures = Vec::new();

    for (index, bytes) in body.split(|byte| *byte == b'\n').enumerate() {
        let position = index + 1;
        let line = match std::str::from_utf8(bytes) {
            Ok(line) => line.trim(),
            Err(error) => {
                failures.push(MappingFailure {
                    position,
                    message: MappingError::InvalidUtf8 {
                        line: position,
                        message: error.to_string(),
                    }
                    .to_string(),
                    raw: None,
                });
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => values.push((position, value)),
            Err(error) => failures.push(MappingFailure {
                position,
                message: MappingError::InvalidJson {
                    line: position,
                    message: error.to_string(),
                }
                .to_string(),
                raw: None,
            }),
        }
    }

    (values, failures)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DispatchSummary {
    pub total: usize,
    pub mapping_failures: Vec<MappingFailure>,
    pub emission: EmissionReport,
}

impl DispatchSummary {
    pub fn is_complete(&self) -> bool {
        self.mapping_failures.is_empty() && self.emission.is_complete()
    }

    pub fn undelivered(&self) -> usize {
        self.mapping_failures.len() + self.emission.failed_records.len()
    }

    pub fn describe(&self) -> String {
        if self.is_complete() {
            format!("all {} records were emitted", self.total)
        } else {
            format!(
                "{} of {} records could not be emitted ({} unmapped, {} undelivered)",
                self.undelivered(),
                self.total,
                self.mapping_failures.len(),
                self.emission.failed_records.len()
            )
        }
    }

    /// Folds another source's summary into this one.
    pub fn absorb(&mut self, other: DispatchSummary) {
        self.total += other.total;
        self.mapping_failures.extend(other.mapping_failures);
        self.emission.total_records += other.emission.total_records;
        self.emission.rounds = self.emission.rounds.max(other.emission.rounds);
        self.emission.submissions += other.emission.submissions;
        self.emission.failed_records.extend(other.emission.failed_records);
        self.emission.last_failures.extend(other.emission.last_failures);
    }
}

/// Maps every raw value and emits the mapped records in one emission call.
pub fn dispatch<P: EventPublisher>(
    raw_values: Vec<(usize, Value)>,
    mapper: &impl RecordMapper,
    emitter: &BatchEmitter<P>,
) -> DispatchSummary {
    let total = raw_values.len();
    let mut records = Vec::with_capacity(total);
    let mut mapping_failures = Vec::new();

    for (position, raw) in raw_values {
        match mapper.map_record(&raw) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(position, error = %error, "legacy record could not be mapped");
                mapping_failures.push(MappingFailure {
                    position,
                    message: error.to_string(),
                    raw: Some(raw),
                });
            }
        }
    }

    let emission = emitter.emit_with_report(records);
    DispatchSummary {
        total,
        mapping_failures,
        emission,
    }
}

/// Parses a newline-delimited legacy file and dispatches its records.
pub fn dispatch_json_lines<P: EventPublisher>(
    body: &[u8],
    mapper: &impl RecordMapper,
    emitter: &BatchEmitter<P>,
) -> DispatchSummary {
    let (values, parse_failures) = parse_json_lines(body);
    let mut summary = dispatch(values, mapper, emitter);
    summary.total += parse_failures.len();
    summary.mapping_failures.extend(parse_failures);
    summary
        .mapping_failures
        .sort_by_key(|failure| failure.position);
    summary
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_lines_skip_blanks_and_report_garbage() {
        let body = b"{\"id\":\"a\"}\n\n not json\n{\"id\":2}\n";
        let (values, failures) = parse_json_lines(body);

        assert_eq!(values.len(), 2);
        assert_eq!(values[1].0, 4);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].position, 3);
        assert!(failures[0].message.starts_with("line 3: invalid JSON"));
    }

    #[test]
    fn invalid_utf8_line_is_reported_not_rewritten() {
        let body = b"{\"id\":\"r0\"}\n{\"id\":\"r1\",\"title\":\"caf\xE9\"}\r\n{\"id\":\"r2\"}\r\n";
        let (values, failures) = parse_json_lines(body);

        let ids: Vec<&Value> = values.iter().map(|(_, value)| &value["id"]).collect();
        assert_eq!(ids, vec![&json!("r0"), &json!("r2")]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].position, 2);
        assert!(failures[0].message.starts_with("line 2: invalid UTF-8"));
    }

    #[test]
    fn storage_entry_mapper_fails_fast_on_missing_key_component() {
        let error = StorageEntryMapper
            .map_record(&json!({
                "type": "Resource",
                "identifier": "R1",
                "customerId": "customer-1",
                "createdDate": "2026-02-14T10:00:00Z",
                "modifiedDate": "2026-02-14T10:00:00Z",
                "rowVersion": "v1",
                "status": "DRAFT"
            }))
            .expect_err("owner is required");

        assert!(matches!(
            error,
            MappingError::Key(KeyError::MissingKeyComponent { field: "owner", .. })
        ));
    }

    #[test]
    fn storage_entry_mapper_rejects_unknown_types() {
        let error = StorageEntryMapper
            .map_record(&json!({"type": "Invoice", "identifier": "I1"}))
            .expect_err("unknown type fails");
        assert!(matches!(error, MappingError::InvalidEntry(_)));
    }

    #[test]
    fn field_mapper_accepts_string_and_numeric_identifiers() {
        let mapper = JsonFieldMapper::default();

        let record = mapper
            .map_record(&json!({"id": " 42a ", "title": "x"}))
            .expect("string id maps");
        assert_eq!(record.identifier, "42a");
        assert_eq!(record.payload["title"], json!("x"));

        let record = mapper.map_record(&json!({"id": 7})).expect("numeric id maps");
        assert_eq!(record.identifier, "7");

        let error = mapper
            .map_record(&json!({"title": "x"}))
            .expect_err("missing id fails");
        assert_eq!(error.to_string(), "record has no usable 'id' identifier");
    }

    #[test]
    fn summary_describes_partial_progress() {
        let summary = DispatchSummary {
            total: 5,
            mapping_failures: vec![MappingFailure {
                position: 1,
                message: "bad".to_string(),
                raw: None,
            }],
            emission: EmissionReport {
                total_records: 4,
                rounds: 10,
                submissions: 10,
                failed_records: vec![Record::new("b", json!({}))],
                last_failures: Vec::new(),
            },
        };

        assert!(!summary.is_complete());
        assert_eq!(
            summary.describe(),
            "2 of 5 records could not be emitted (1 unmapped, 1 undelivered)"
        );
    }
}
