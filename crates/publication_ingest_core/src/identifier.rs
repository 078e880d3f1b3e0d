use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::keys::KEY_DELIMITER;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier cannot be empty")]
    Empty,
    #[error("identifier '{0}' contains the key delimiter '{delimiter}'", delimiter = KEY_DELIMITER)]
    ContainsDelimiter(String),
}

/// Entry identifier whose lexical order follows creation time.
///
/// Generated identifiers are `{unix_millis:012x}-{uuid}`; imported identifiers keep
/// whatever form the source used as long as they can be embedded in a key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortableIdentifier(String);

impl SortableIdentifier {
    pub fn next() -> Self {
        let millis = Utc::now().timestamp_millis().max(0);
        Self(format!("{millis:012x}-{}", Uuid::new_v4().simple()))
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if trimmed.contains(KEY_DELIMITER) {
            return Err(IdentifierError::ContainsDelimiter(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SortableIdentifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SortableIdentifier> for String {
    fn from(value: SortableIdentifier) -> Self {
        value.0
    }
}

impl fmt::Display for SortableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque optimistic-concurrency token, replaced on every write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowVersion(String);

impl RowVersion {
    pub fn next() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identifiers_sort_by_creation_time() {
        let first = SortableIdentifier::next();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = SortableIdentifier::next();
        assert!(first < second);
    }

    #[test]
    fn parse_rejects_empty_and_delimited_values() {
        assert_eq!(SortableIdentifier::parse("  "), Err(IdentifierError::Empty));
        assert!(matches!(
            SortableIdentifier::parse("a#b"),
            Err(IdentifierError::ContainsDelimiter(_))
        ));
        assert_eq!(
            SortableIdentifier::parse(" 0190f3c2 ")
                .expect("valid identifier")
                .as_str(),
            "0190f3c2"
        );
    }

    #[test]
    fn deserialization_goes_through_validation() {
        let parsed: Result<SortableIdentifier, _> = serde_json::from_str("\"x#y\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn row_versions_are_fresh() {
        assert_ne!(RowVersion::next(), RowVersion::next());
    }
}
