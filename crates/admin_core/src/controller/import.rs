//! Concurrent batch creation for CSV imports.

use client_core::EntityService;
use futures::future::join_all;
use serde::Serialize;
use shared::domain::Entity;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RecordOutcome {
    Created(Entity),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub source_record: Entity,
    pub outcome: RecordOutcome,
}

impl ImportOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RecordOutcome::Created(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportTally {
    pub succeeded: usize,
    pub failed: usize,
}

impl ImportTally {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Some records persisted while others did not.
    pub fn is_partial_failure(&self) -> bool {
        self.succeeded > 0 && self.failed > 0
    }
}

/// Per-record results of one import, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub outcomes: Vec<ImportOutcome>,
    /// Set when the list reload after the batch failed; the outcomes still stand.
    pub refetch_error: Option<String>,
}

impl ImportReport {
    pub fn tally(&self) -> ImportTally {
        let succeeded = self.outcomes.iter().filter(|o| o.succeeded()).count();
        ImportTally {
            succeeded,
            failed: self.outcomes.len() - succeeded,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ImportOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.succeeded())
    }
}

/// Issues every create before awaiting any; one rejection never cancels the others.
pub(crate) async fn create_all(
    service: &dyn EntityService,
    records: Vec<Entity>,
) -> Vec<ImportOutcome> {
    let attempts = records.iter().cloned().map(|record| service.create(record));
    let results = join_all(attempts).await;

    records
        .into_iter()
        .zip(results)
        .map(|(source_record, result)| {
            let label = source_record.display_label();
            let outcome = match result {
                Ok(created) => {
                    info!(record = %label, "imported record");
                    RecordOutcome::Created(created)
                }
                Err(err) => {
                    warn!(record = %label, error = %err, "failed to import record");
                    RecordOutcome::Failed(err.to_string())
                }
            };
            ImportOutcome {
                source_record,
                outcome,
            }
        })
        .collect()
}
