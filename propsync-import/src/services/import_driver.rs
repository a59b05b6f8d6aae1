//! Batch import driver
//!
//! Runs one bounded batch per invocation: field map, HTML normalize, photo
//! resolve, catalog insert, checkpoint save, for each record. The checkpoint
//! is saved synchronously after every record so an interruption loses at
//! most the record in flight.
//!
//! Record-level failures are bookkept (error list + retry queue) and never
//! halt the run. The whole-run `Failed` state is reserved for checkpoint
//! storage faults. A second concurrent runner loses the optimistic version
//! race at its first save and backs off with a conflict.

use chrono::Utc;
use sqlx::SqlitePool;

use propsync_common::events::{EventBus, PropsyncEvent};
use propsync_common::{Error, Result};

use crate::db;
use crate::models::{ImportCheckpoint, LegacyPropertyRecord, PropertyRecord, RunState};
use crate::services::{field_mapper, photo_resolver};

/// Default records per driver invocation
pub const DEFAULT_BATCH_SIZE: u32 = 30;

/// What happened to a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    Imported,
    Skipped,
}

pub struct ImportDriver {
    db: SqlitePool,
    event_bus: EventBus,
    batch_size: u32,
    legacy_photo_host: String,
}

impl ImportDriver {
    pub fn new(db: SqlitePool, event_bus: EventBus, batch_size: u32, legacy_photo_host: impl Into<String>) -> Self {
        Self {
            db,
            event_bus,
            batch_size: batch_size.max(1),
            legacy_photo_host: legacy_photo_host.into(),
        }
    }

    /// Run one batch against the given source records
    ///
    /// Records must be sorted by id with unique ids (the export parser
    /// guarantees both). Returns the checkpoint as persisted at the end of
    /// the run.
    pub async fn run_batch(&self, records: &[LegacyPropertyRecord]) -> Result<ImportCheckpoint> {
        let mut checkpoint = db::checkpoint::load_checkpoint(&self.db).await?;

        if checkpoint.has_live_run() {
            return Err(Error::Conflict(
                "an import run is already active".to_string(),
            ));
        }
        if checkpoint.run_state.is_active() {
            // RUNNING past the lease: the previous runner died mid-run.
            // The per-record saves mean its watermark is intact, so we
            // resume from it instead of forcing an operator reset.
            tracing::warn!(
                last_processed_id = checkpoint.last_processed_id,
                last_updated_at = %checkpoint.last_updated_at,
                "Reclaiming checkpoint left RUNNING by an interrupted run"
            );
        }

        if checkpoint.run_state == RunState::Idle {
            checkpoint.started_at = Utc::now();
        }
        checkpoint.run_state = RunState::Running;
        // This save claims the run; a stale version here means another
        // runner got in first.
        db::checkpoint::save_checkpoint(&self.db, &mut checkpoint).await?;

        self.event_bus.emit(PropsyncEvent::ImportRunStarted {
            resume_from_id: checkpoint.last_processed_id,
            batch_size: self.batch_size,
            retry_pending: checkpoint.retryable_ids().len(),
            timestamp: Utc::now(),
        });
        tracing::info!(
            resume_from_id = checkpoint.last_processed_id,
            batch_size = self.batch_size,
            "Import run started"
        );

        let dropped = checkpoint.prune_missing_retries(|id| records.iter().any(|r| r.id == id));
        if !dropped.is_empty() {
            tracing::warn!(
                ids = ?dropped,
                "Dropped retry entries for records no longer in the source export"
            );
        }

        let batch = plan_batch(&checkpoint, records, self.batch_size);
        let batch_first_id = batch.first().map(|r| r.id);

        for record in &batch {
            match self.process_record(record).await {
                Ok(RecordOutcome::Imported) => {
                    checkpoint.record_success(record.id);
                    self.event_bus.emit(PropsyncEvent::RecordImported {
                        wp_id: record.id,
                        processed: checkpoint.total_processed,
                        timestamp: Utc::now(),
                    });
                    tracing::info!(wp_id = record.id, "Imported property");
                }
                Ok(RecordOutcome::Skipped) => {
                    checkpoint.record_success(record.id);
                    self.event_bus.emit(PropsyncEvent::RecordSkipped {
                        wp_id: record.id,
                        timestamp: Utc::now(),
                    });
                    tracing::debug!(wp_id = record.id, "Property already in catalog, skipped");
                }
                Err(e) => {
                    checkpoint.record_failure(record.id, e.to_string());
                    self.event_bus.emit(PropsyncEvent::RecordFailed {
                        wp_id: record.id,
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    tracing::warn!(wp_id = record.id, error = %e, "Record failed; run continues");
                }
            }

            if let Err(e) = db::checkpoint::save_checkpoint(&self.db, &mut checkpoint).await {
                // Checkpoint storage is gone; this is the whole-run fault.
                self.finish(RunState::Failed, &checkpoint);
                return Err(e);
            }
        }

        let more_fresh = records
            .iter()
            .any(|r| r.id > checkpoint.last_processed_id);
        let more_retries = !checkpoint.retryable_ids().is_empty();

        checkpoint.run_state = if more_fresh || more_retries {
            RunState::Paused
        } else {
            RunState::Completed
        };
        if let Some(first_id) = batch_first_id {
            checkpoint.completed_batches.push(first_id);
        }
        db::checkpoint::save_checkpoint(&self.db, &mut checkpoint).await?;

        self.finish(checkpoint.run_state, &checkpoint);
        Ok(checkpoint)
    }

    fn finish(&self, state: RunState, checkpoint: &ImportCheckpoint) {
        self.event_bus.emit(PropsyncEvent::ImportRunFinished {
            state: state.label().to_string(),
            total_processed: checkpoint.total_processed,
            total_failed: checkpoint.total_failed,
            timestamp: Utc::now(),
        });
        tracing::info!(
            state = state.label(),
            total_processed = checkpoint.total_processed,
            total_failed = checkpoint.total_failed,
            "Import run finished"
        );
    }

    async fn process_record(&self, record: &LegacyPropertyRecord) -> Result<RecordOutcome> {
        if db::properties::exists(&self.db, record.id).await? {
            return Ok(RecordOutcome::Skipped);
        }

        let mapped = field_mapper::map_property(record)?;
        let property = PropertyRecord::pending(record.id, mapped, record.pic_numb);
        db::properties::insert_property(&self.db, &property).await?;

        let resolved = photo_resolver::resolve_all(
            record.id,
            record.pic_numb,
            &[],
            &self.legacy_photo_host,
        );
        let urls: Vec<String> = resolved
            .iter()
            .filter_map(|p| p.as_url().map(str::to_string))
            .collect();
        if !urls.is_empty() {
            db::properties::update_photo_urls(&self.db, record.id, &urls).await?;
        }

        Ok(RecordOutcome::Imported)
    }
}

/// Select the records for one batch: retryable failures first, then fresh
/// records past the watermark, capped at `batch_size`.
fn plan_batch<'a>(
    checkpoint: &ImportCheckpoint,
    records: &'a [LegacyPropertyRecord],
    batch_size: u32,
) -> Vec<&'a LegacyPropertyRecord> {
    let retry_ids = checkpoint.retryable_ids();
    let mut batch: Vec<&LegacyPropertyRecord> = Vec::with_capacity(batch_size as usize);

    for id in &retry_ids {
        if batch.len() >= batch_size as usize {
            return batch;
        }
        if let Some(record) = records.iter().find(|r| r.id == *id) {
            batch.push(record);
        }
    }

    for record in records {
        if batch.len() >= batch_size as usize {
            break;
        }
        if record.id > checkpoint.last_processed_id {
            batch.push(record);
        }
    }

    batch
}
