use serde::{Deserialize, Serialize};

use crate::record::Record;

/// An ordered group of records bound for one publish call. Resubmitted unchanged on retry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmissionBatch {
    pub batch_index: usize,
    pub records: Vec<Record>,
}

impl EmissionBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Splits `records` into consecutive batches of at most `batch_size`, keeping input order.
///
/// `batch_size` is validated by [`crate::config::EmitterConfig::validate`]; a zero size here
/// is a programmer error.
pub fn partition_batches(records: Vec<Record>, batch_size: usize) -> Vec<EmissionBatch> {
    assert!(batch_size > 0, "batch_size must be positive");

    let batch_count = records.len().div_ceil(batch_size);
    let mut batches = Vec::with_capacity(batch_count);
    let mut current = Vec::with_capacity(batch_size.min(records.len()));

    for record in records {
        current.push(record);
        if current.len() == batch_size {
            batches.push(EmissionBatch {
                batch_index: batches.len(),
                records: std::mem::take(&mut current),
            });
        }
    }

    if !current.is_empty() {
        batches.push(EmissionBatch {
            batch_index: batches.len(),
            records: current,
        });
    }

    debug_assert_eq!(batches.len(), batch_count);
    batches
}
