use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_ROUNDS: usize = 10;
pub const DEFAULT_EVENT_BUS_NAME: &str = "default";
pub const DEFAULT_REGION: &str = "eu-west-1";

/// Upper bound on entries accepted by a single PutEvents call.
pub const MAX_BATCH_SIZE: usize = 10;

pub const ENV_BATCH_SIZE: &str = "EMISSION_BATCH_SIZE";
pub const ENV_MAX_ROUNDS: &str = "EMISSION_MAX_ROUNDS";
pub const ENV_EVENT_BUS_NAME: &str = "EVENT_BUS_NAME";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_PARALLEL_SUBMISSIONS: &str = "EMISSION_PARALLEL_SUBMISSIONS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("batch_size must be between 1 and {max}, got {0}", max = MAX_BATCH_SIZE)]
    InvalidBatchSize(usize),
    #[error("max_rounds must be a positive integer")]
    InvalidMaxRounds,
    #[error("event_bus_name cannot be empty")]
    EmptyEventBusName,
    #[error("{key} must be {expected}, got '{value}'")]
    Unparseable {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Emission settings, read once at process start and passed down by value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmitterConfig {
    pub batch_size: usize,
    pub max_rounds: usize,
    pub event_bus_name: String,
    pub region: String,
    /// Submit the batches of one round from the rayon pool instead of one by one.
    #[serde(default)]
    pub parallel_submissions: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_rounds: DEFAULT_MAX_ROUNDS,
            event_bus_name: DEFAULT_EVENT_BUS_NAME.to_string(),
            region: DEFAULT_REGION.to_string(),
            parallel_submissions: false,
        }
    }
}

impl EmitterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; blank values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();
        let config = Self {
            batch_size: match read(ENV_BATCH_SIZE) {
                Some(value) => parse_count(ENV_BATCH_SIZE, &value)?,
                None => defaults.batch_size,
            },
            max_rounds: match read(ENV_MAX_ROUNDS) {
                Some(value) => parse_count(ENV_MAX_ROUNDS, &value)?,
                None => defaults.max_rounds,
            },
            event_bus_name: read(ENV_EVENT_BUS_NAME).unwrap_or(defaults.event_bus_name),
            region: read(ENV_REGION).unwrap_or(defaults.region),
            parallel_submissions: match read(ENV_PARALLEL_SUBMISSIONS) {
                Some(value) => parse_flag(ENV_PARALLEL_SUBMISSIONS, &value)?,
                None => defaults.parallel_submissions,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::InvalidMaxRounds);
        }
        if self.event_bus_name.trim().is_empty() {
            return Err(ConfigError::EmptyEventBusName);
        }
        Ok(())
    }
}

fn parse_count(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::Unparseable {
        key,
        expected: "a non-negative integer",
        value: value.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Unparseable {
            key,
            expected: "a boolean",
            value: value.to_string(),
        }),
    }
}
