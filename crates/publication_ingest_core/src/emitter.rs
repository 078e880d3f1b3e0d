//! Batched, retrying event emission.
//!
//! Records are partitioned into fixed-size batches and published one call per batch.
//! Any batch that reports at least one failed entry is resubmitted whole in the next
//! round; rounds repeat until every batch is accepted or the round bound is reached.
//! Delivery is at-least-once: records that shared a batch with a rejected entry may be
//! published more than once.

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::batching::{partition_batches, EmissionBatch};
use crate::config::{ConfigError, EmitterConfig};
use crate::event::{build_entries, EmissionOutcome, EventPublisher, FailedEntry};
use crate::record::{EmissionContext, Record};

/// What happened during one `emit` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmissionReport {
    pub total_records: usize,
    pub rounds: usize,
    pub submissions: usize,
    /// Records of every batch still failing after the last round, each exactly once.
    pub failed_records: Vec<Record>,
    /// Per-entry failures reported in the last round.
    pub last_failures: Vec<FailedEntry>,
}

impl EmissionReport {
    pub fn is_complete(&self) -> bool {
        self.failed_records.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_complete() {
            format!("all {} records were emitted", self.total_records)
        } else {
            format!(
                "{} of {} records could not be emitted",
                self.failed_records.len(),
                self.total_records
            )
        }
    }
}

pub struct BatchEmitter<P> {
    publisher: P,
    config: EmitterConfig,
    context: EmissionContext,
}

impl<P: EventPublisher> BatchEmitter<P> {
    pub fn new(
        publisher: P,
        config: EmitterConfig,
        context: EmissionContext,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            publisher,
            config,
            context,
        })
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    pub fn context(&self) -> &EmissionContext {
        &self.context
    }

    /// Publishes `records` and returns those that could not be delivered.
    pub fn emit(&self, records: Vec<Record>) -> Vec<Record> {
        self.emit_with_report(records).failed_records
    }

    pub fn emit_with_report(&self, records: Vec<Record>) -> EmissionReport {
        let total_records = records.len();
        if records.is_empty() {
            return EmissionReport::default();
        }

        let mut pending = partition_batches(records, self.config.batch_size);
        let mut report = EmissionReport {
            total_records,
            ..EmissionReport::default()
        };

        while !pending.is_empty() && report.rounds < self.config.max_rounds {
            report.rounds += 1;
            report.submissions += pending.len();

            let outcomes = self.submit_round(pending, report.rounds);
            report.last_failures = outcomes
                .iter()
                .flat_map(|outcome| outcome.failed_entries().iter().cloned())
                .collect();
            pending = outcomes
                .into_iter()
                .filter(EmissionOutcome::is_failure)
                .map(EmissionOutcome::into_batch)
                .collect();

            if !pending.is_empty() && report.rounds < self.config.max_rounds {
                tracing::warn!(
                    round = report.rounds,
                    failed_batches = pending.len(),
                    failed_entries = report.last_failures.len(),
                    "resubmitting failed event batches"
                );
            }
        }

        report.failed_records = pending
            .into_iter()
            .flat_map(|batch| batch.records)
            .collect();

        if report.is_complete() {
            tracing::info!(
                total_records,
                rounds = report.rounds,
                submissions = report.submissions,
                "event emission completed"
            );
        } else {
            tracing::error!(
                total_records,
                failed_records = report.failed_records.len(),
                rounds = report.rounds,
                "event emission exhausted retries"
            );
        }

        report
    }

    fn submit_round(&self, batches: Vec<EmissionBatch>, round: usize) -> Vec<EmissionOutcome> {
        if self.config.parallel_submissions {
            batches
                .into_par_iter()
                .map(|batch| self.submit_batch(batch, round))
                .collect()
        } else {
            batches
                .into_iter()
                .map(|batch| self.submit_batch(batch, round))
                .collect()
        }
    }

    fn submit_batch(&self, batch: EmissionBatch, round: usize) -> EmissionOutcome {
        let entries = build_entries(
            &batch,
            &self.context,
            &self.config.event_bus_name,
            Utc::now(),
        );
        tracing::info!(
            event_bus = %self.config.event_bus_name,
            batch_index = batch.batch_index,
            batch_size = entries.len(),
            round,
            "submitting event batch"
        );

        match self.publisher.put_events(&entries) {
            Ok(response) => {
                let rejected: Vec<&str> = response
                    .entries
                    .iter()
                    .filter_map(|result| result.error_code.as_deref())
                    .collect();
                if response.failed_entry_count > 0 || !rejected.is_empty() {
                    tracing::warn!(
                        batch_index = batch.batch_index,
                        round,
                        failed_entry_count = response.failed_entry_count,
                        error_codes = ?rejected,
                        response = ?response,
                        "event batch had rejected entries"
                    );
                } else {
                    tracing::debug!(
                        batch_index = batch.batch_index,
                        response = ?response,
                        "event batch response"
                    );
                }
                EmissionOutcome::from_response(batch, &response)
            }
            Err(error) => {
                tracing::warn!(
                    batch_index = batch.batch_index,
                    round,
                    error = %error,
                    "event batch call failed"
                );
                EmissionOutcome::from_error(batch, &error)
            }
        }
    }
}
