use sha2::{Digest, Sha256};

const SOURCE_DIGEST_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    EmissionFailures,
    MappingFailures,
}

impl ReportKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::EmissionFailures => "emission_failures",
            Self::MappingFailures => "mapping_failures",
        }
    }
}

pub fn report_prefix(
    base_prefix: &str,
    kind: ReportKind,
    import_date: &str,
    source: &str,
) -> String {
    let trimmed = base_prefix.trim_matches('/');
    format!(
        "{trimmed}/dataset={}/import_date={import_date}/source={}",
        kind.as_str(),
        sanitize_partition_value(source),
    )
}

/// Object key of one report. The part name carries a digest of the raw source label, so
/// labels that sanitize to the same segment still get distinct keys.
pub fn report_object_key(
    base_prefix: &str,
    kind: ReportKind,
    import_date: &str,
    source: &str,
    part: &str,
) -> String {
    format!(
        "{}/part-{}-{}.json",
        report_prefix(base_prefix, kind, import_date, source),
        sanitize_partition_value(part),
        source_digest(source),
    )
}

fn source_digest(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..SOURCE_DIGEST_LEN].to_string()
}

/// Makes an arbitrary source label safe to embed as a single path segment.
fn sanitize_partition_value(value: &str) -> String {
    let sanitized: String = value
        .trim()
        .chars()
        .map(|character| match character {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => character,
            _ => '_',
        })
        .collect();
    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}
