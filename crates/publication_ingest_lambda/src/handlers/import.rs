use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use publication_ingest_core::emitter::BatchEmitter;
use publication_ingest_core::event::{EventPublisher, FailedEntry};
use publication_ingest_core::pipeline::{
    dispatch_json_lines, DispatchSummary, MappingFailure, RecordMapper,
};
use publication_ingest_core::record::Record;
use publication_ingest_core::report_keys::{report_object_key, ReportKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapters::object_store::{ObjectSource, ReportStore};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

/// Per-invocation settings for the import handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportHandlerConfig {
    pub report_prefix: String,
    pub import_date: String,
    /// Distinguishes reports written by different invocations for the same source.
    pub report_part: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ImportRequest {
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    fn label(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSummary {
    pub bucket: String,
    pub key: String,
    pub total: usize,
    pub unmapped: usize,
    pub undelivered: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportResponse {
    pub status: String,
    pub message: String,
    pub total_records: usize,
    pub unmapped: usize,
    pub undelivered: usize,
    pub sources: Vec<SourceSummary>,
    pub reports: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EmissionFailureReport<'a> {
    source: String,
    rounds: usize,
    records: &'a [Record],
    last_failures: &'a [FailedEntry],
}

#[derive(Debug, Serialize)]
struct MappingFailureReport<'a> {
    source: String,
    failures: &'a [MappingFailure],
}

/// Entry point for both a bulk import request and an S3 object notification.
pub fn handle_import_event<P, M>(
    event: Value,
    object_source: &dyn ObjectSource,
    report_store: &dyn ReportStore,
    mapper: &M,
    emitter: &BatchEmitter<P>,
    config: &ImportHandlerConfig,
) -> ApiGatewayResponse
where
    P: EventPublisher,
    M: RecordMapper,
{
    let objects = if is_s3_notification(&event) {
        match decode_s3_objects(&event) {
            Ok(value) => value,
            Err(message) => return validation_error_response(&message),
        }
    } else {
        let request = match normalize_apigw_event(event).and_then(parse_import_request) {
            Ok(value) => value,
            Err(message) => return validation_error_response(&message),
        };
        if request.bucket.trim().is_empty() {
            return validation_error_response("bucket must not be empty");
        }

        match object_source.list_keys(&request.bucket, &request.prefix) {
            Ok(keys) => keys
                .into_iter()
                .map(|key| ObjectRef {
                    bucket: request.bucket.clone(),
                    key,
                })
                .collect(),
            Err(error) => {
                return error_response(
                    502,
                    json!({
                        "error": "listing_failed",
                        "message": error,
                    }),
                );
            }
        }
    };

    tracing::info!(objects = objects.len(), "importing legacy objects");

    let mut overall = DispatchSummary::default();
    let mut sources = Vec::with_capacity(objects.len());
    let mut reports = Vec::new();
    let mut read_failures = 0usize;

    for object in &objects {
        let body = match object_source.read_object(&object.bucket, &object.key) {
            Ok(body) => body,
            Err(error) => {
                tracing::error!(
                    bucket = %object.bucket,
                    key = %object.key,
                    error = %error,
                    "legacy object could not be read"
                );
                read_failures += 1;
                sources.push(SourceSummary {
                    bucket: object.bucket.clone(),
                    key: object.key.clone(),
                    total: 0,
                    unmapped: 0,
                    undelivered: 0,
                    error: Some(error),
                });
                continue;
            }
        };

        let summary = dispatch_json_lines(&body, mapper, emitter);
        tracing::info!(
            bucket = %object.bucket,
            key = %object.key,
            total = summary.total,
            unmapped = summary.mapping_failures.len(),
            undelivered = summary.emission.failed_records.len(),
            "legacy object dispatched"
        );

        let report_error =
            write_failure_reports(object, &summary, report_store, config, &mut reports);
        sources.push(SourceSummary {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
            total: summary.total,
            unmapped: summary.mapping_failures.len(),
            undelivered: summary.emission.failed_records.len(),
            error: report_error,
        });
        overall.absorb(summary);
    }

    let complete = overall.is_complete() && read_failures == 0;
    let response = ImportResponse {
        status: if complete { "completed" } else { "partial" }.to_string(),
        message: overall.describe(),
        total_records: overall.total,
        unmapped: overall.mapping_failures.len(),
        undelivered: overall.emission.failed_records.len(),
        sources,
        reports,
    };
    success_response(if complete { 200 } else { 207 }, response)
}

/// Writes one report per failure kind. Returns the first write error, if any.
fn write_failure_reports(
    object: &ObjectRef,
    summary: &DispatchSummary,
    report_store: &dyn ReportStore,
    config: &ImportHandlerConfig,
    written: &mut Vec<String>,
) -> Option<String> {
    let label = object.label();
    let mut pending: Vec<(String, Result<Vec<u8>, serde_json::Error>)> = Vec::new();

    if !summary.emission.failed_records.is_empty() {
        let report = EmissionFailureReport {
            source: label.clone(),
            rounds: summary.emission.rounds,
            records: &summary.emission.failed_records,
            last_failures: &summary.emission.last_failures,
        };
        pending.push((
            report_object_key(
                &config.report_prefix,
                ReportKind::EmissionFailures,
                &config.import_date,
                &label,
                &config.report_part,
            ),
            serde_json::to_vec(&report),
        ));
    }
    if !summary.mapping_failures.is_empty() {
        let report = MappingFailureReport {
            source: label.clone(),
            failures: &summary.mapping_failures,
        };
        pending.push((
            report_object_key(
                &config.report_prefix,
                ReportKind::MappingFailures,
                &config.import_date,
                &label,
                &config.report_part,
            ),
            serde_json::to_vec(&report),
        ));
    }

    let mut first_error = None;
    for (key, body) in pending {
        let result = body
            .map_err(|error| format!("failed to serialize report: {error}"))
            .and_then(|body| report_store.write_object(&key, &body));
        match result {
            Ok(()) => written.push(key),
            Err(error) => {
                tracing::error!(key = %key, error = %error, "failure report could not be written");
                first_error.get_or_insert(error);
            }
        }
    }
    first_error
}

pub fn is_s3_notification(event: &Value) -> bool {
    event
        .get("Records")
        .and_then(Value::as_array)
        .map(|records| {
            !records.is_empty()
                && records.iter().all(|record| {
                    record
                        .get("eventSource")
                        .and_then(Value::as_str)
                        .map(|source| source == "aws:s3")
                        .unwrap_or(false)
                })
        })
        .unwrap_or(false)
}

pub fn decode_s3_objects(event: &Value) -> Result<Vec<ObjectRef>, String> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or_else(|| "S3 event must include Records array".to_string())?;

    records
        .iter()
        .map(|record| {
            let bucket = record
                .pointer("/s3/bucket/name")
                .and_then(Value::as_str)
                .ok_or_else(|| "S3 record must include s3.bucket.name".to_string())?;
            let key = record
                .pointer("/s3/object/key")
                .and_then(Value::as_str)
                .ok_or_else(|| "S3 record must include s3.object.key".to_string())?;
            Ok(ObjectRef {
                bucket: bucket.to_string(),
                key: decode_object_key(key)?,
            })
        })
        .collect()
}

/// Object keys in notifications are form-encoded: `+` is a space.
fn decode_object_key(raw: &str) -> Result<String, String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|error| format!("object key '{raw}' is not valid UTF-8: {error}"))
}

fn normalize_apigw_event(event: Value) -> Result<Value, String> {
    let Some(object) = event.as_object() else {
        return Err("Request payload must be a JSON object".to_string());
    };

    let Some(body) = object.get("body") else {
        return Ok(event);
    };

    match body {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(body.clone()),
        Value::String(text) => {
            serde_json::from_str(text).map_err(|error| format!("Malformed JSON body: {error}"))
        }
        _ => Err("Request body must be a JSON object".to_string()),
    }
}

fn parse_import_request(payload: Value) -> Result<ImportRequest, String> {
    serde_json::from_value(payload).map_err(|error| format!("Malformed request: {error}"))
}

fn validation_error_response(message: &str) -> ApiGatewayResponse {
    error_response(
        400,
        json!({
            "error": "validation_error",
            "message": message,
        }),
    )
}

fn success_response(status_code: u16, payload: impl Serialize) -> ApiGatewayResponse {
    match serde_json::to_string(&payload) {
        Ok(body) => ApiGatewayResponse {
            status_code,
            headers: json!({"Content-Type": "application/json"}),
            body,
        },
        Err(error) => error_response(
            500,
            json!({
                "error": "serialization_error",
                "message": error.to_string(),
            }),
        ),
    }
}

fn error_response(status_code: u16, payload: Value) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: json!({"Content-Type": "application/json"}),
        body: payload.to_string(),
    }
}
