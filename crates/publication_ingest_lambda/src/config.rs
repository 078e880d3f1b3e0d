use publication_ingest_core::config::{ConfigError, EmitterConfig};
use publication_ingest_core::record::{DEFAULT_EVENT_SOURCE, DEFAULT_IMPORT_DETAIL_TYPE};
use publication_ingest_core::schema::DEFAULT_TABLE_NAME;

pub const ENV_TABLE_NAME: &str = "TABLE_NAME";
pub const ENV_FAILURE_REPORT_BUCKET: &str = "FAILURE_REPORT_BUCKET";
pub const ENV_FAILURE_REPORT_PREFIX: &str = "FAILURE_REPORT_PREFIX";
pub const ENV_EVENT_SOURCE: &str = "EVENT_SOURCE";
pub const ENV_IMPORT_DETAIL_TYPE: &str = "IMPORT_DETAIL_TYPE";

pub const DEFAULT_FAILURE_REPORT_PREFIX: &str = "publication-ingest/reports";

/// Process-wide settings for both runtimes, read once in `main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub emitter: EmitterConfig,
    pub table_name: String,
    pub failure_report_bucket: Option<String>,
    pub failure_report_prefix: String,
    pub event_source: String,
    pub import_detail_type: String,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Ok(Self {
            emitter: EmitterConfig::from_lookup(&lookup)?,
            table_name: read(ENV_TABLE_NAME).unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            failure_report_bucket: read(ENV_FAILURE_REPORT_BUCKET),
            failure_report_prefix: read(ENV_FAILURE_REPORT_PREFIX)
                .unwrap_or_else(|| DEFAULT_FAILURE_REPORT_PREFIX.to_string()),
            event_source: read(ENV_EVENT_SOURCE)
                .unwrap_or_else(|| DEFAULT_EVENT_SOURCE.to_string()),
            import_detail_type: read(ENV_IMPORT_DETAIL_TYPE)
                .unwrap_or_else(|| DEFAULT_IMPORT_DETAIL_TYPE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = RuntimeConfig::from_lookup(|_| None).expect("defaults are valid");

        assert_eq!(config.table_name, "publications");
        assert_eq!(config.failure_report_bucket, None);
        assert_eq!(config.failure_report_prefix, DEFAULT_FAILURE_REPORT_PREFIX);
        assert_eq!(config.event_source, DEFAULT_EVENT_SOURCE);
        assert_eq!(config.emitter, EmitterConfig::default());
    }

    #[test]
    fn reads_overrides_and_propagates_emitter_errors() {
        let values: HashMap<&str, &str> = HashMap::from([
            (ENV_TABLE_NAME, "nva-resources"),
            (ENV_FAILURE_REPORT_BUCKET, " import-reports "),
            ("EVENT_BUS_NAME", "ingest-bus"),
        ]);
        let config = RuntimeConfig::from_lookup(|key| values.get(key).map(|v| v.to_string()))
            .expect("overrides are valid");

        assert_eq!(config.table_name, "nva-resources");
        assert_eq!(config.failure_report_bucket.as_deref(), Some("import-reports"));
        assert_eq!(config.emitter.event_bus_name, "ingest-bus");

        let error = RuntimeConfig::from_lookup(|key| {
            (key == "EMISSION_BATCH_SIZE").then(|| "11".to_string())
        })
        .expect_err("oversized batches are rejected");
        assert_eq!(error, ConfigError::InvalidBatchSize(11));
    }
}
