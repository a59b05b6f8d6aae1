//! Import checkpoint and run state machine
//!
//! The checkpoint, not the batch, is the unit of resumability: it is
//! persisted after every record so an interruption loses at most the
//! in-flight record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum retry attempts per failed record before it is parked
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Seconds a RUNNING checkpoint stays claimed without a save
///
/// The driver saves after every record, so a RUNNING checkpoint older than
/// this belongs to a runner that died mid-run and may be reclaimed.
pub const RUN_LEASE_SECONDS: i64 = 60;

/// Import run state
///
/// `Failed` applies to the whole run only (checkpoint storage unavailable);
/// individual record failures are appended to `errors` and the run
/// continues. `Idle` is re-entered only through an explicit operator reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    /// No run performed yet, or checkpoint was reset
    Idle,
    /// A driver invocation is processing records
    Running,
    /// The source export is exhausted
    Completed,
    /// A batch finished with records remaining
    Paused,
    /// Whole-run fault; requires operator attention
    Failed,
}

impl RunState {
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunState::Idle => "IDLE",
            RunState::Running => "RUNNING",
            RunState::Completed => "COMPLETED",
            RunState::Paused => "PAUSED",
            RunState::Failed => "FAILED",
        }
    }
}

/// One failed record, as surfaced to operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportErrorEntry {
    /// Legacy WPL property id
    pub id: i64,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Retry bookkeeping for a failed record
///
/// Entries with `attempts < MAX_RETRY_ATTEMPTS` are drained at the start of
/// the next run, before the watermark advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryEntry {
    /// Legacy WPL property id
    pub id: i64,
    pub attempts: u32,
    pub last_error: String,
}

impl RetryEntry {
    pub fn is_retryable(&self) -> bool {
        self.attempts < MAX_RETRY_ATTEMPTS
    }
}

/// Persisted progress record for the import pipeline
///
/// Single row in SQLite, guarded by an optimistic version so a concurrent
/// second runner fails fast instead of corrupting state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportCheckpoint {
    /// Highest successfully visited id; monotonically non-decreasing
    /// within a run
    pub last_processed_id: i64,
    pub total_processed: u64,
    pub total_failed: u64,
    pub errors: Vec<ImportErrorEntry>,
    pub retry_queue: Vec<RetryEntry>,
    /// First id of every batch that ran to the end
    pub completed_batches: Vec<i64>,
    pub run_state: RunState,
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    /// Optimistic lock version; incremented by every save
    #[serde(default)]
    pub version: i64,
}

impl ImportCheckpoint {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            last_processed_id: 0,
            total_processed: 0,
            total_failed: 0,
            errors: Vec::new(),
            retry_queue: Vec::new(),
            completed_batches: Vec::new(),
            run_state: RunState::Idle,
            started_at: now,
            last_updated_at: now,
            version: 0,
        }
    }

    /// Record a successfully imported (or skipped) id
    ///
    /// Advances the watermark only forward; retry-queue draining re-visits
    /// older ids without lowering it.
    pub fn record_success(&mut self, id: i64) {
        self.total_processed += 1;
        if id > self.last_processed_id {
            self.last_processed_id = id;
        }
        self.retry_queue.retain(|entry| entry.id != id);
    }

    /// Record a failed id and queue it for retry
    ///
    /// The watermark still advances past the failed id; the retry queue,
    /// not the watermark, owns re-processing.
    pub fn record_failure(&mut self, id: i64, error: impl Into<String>) {
        let error = error.into();
        self.total_failed += 1;
        self.errors.push(ImportErrorEntry {
            id,
            error: error.clone(),
            timestamp: Utc::now(),
        });

        match self.retry_queue.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.attempts += 1;
                entry.last_error = error;
            }
            None => self.retry_queue.push(RetryEntry {
                id,
                attempts: 1,
                last_error: error,
            }),
        }

        if id > self.last_processed_id {
            self.last_processed_id = id;
        }
    }

    /// Ids eligible for another attempt
    pub fn retryable_ids(&self) -> Vec<i64> {
        self.retry_queue
            .iter()
            .filter(|entry| entry.is_retryable())
            .map(|entry| entry.id)
            .collect()
    }

    /// Whether a live runner currently holds the checkpoint
    ///
    /// RUNNING with a recent save means an active run; RUNNING past the
    /// lease means the runner died and the checkpoint may be reclaimed.
    pub fn has_live_run(&self) -> bool {
        self.run_state.is_active()
            && Utc::now().signed_duration_since(self.last_updated_at)
                < chrono::Duration::seconds(RUN_LEASE_SECONDS)
    }

    /// Drop retryable entries whose record no longer exists in the source
    ///
    /// A failed id that vanished from the export can never succeed; leaving
    /// it queued would keep every run stuck in `Paused`. Parked entries
    /// (attempts exhausted) are kept as history. Returns the dropped ids.
    pub fn prune_missing_retries(&mut self, is_present: impl Fn(i64) -> bool) -> Vec<i64> {
        let dropped: Vec<i64> = self
            .retry_queue
            .iter()
            .filter(|entry| entry.is_retryable() && !is_present(entry.id))
            .map(|entry| entry.id)
            .collect();
        self.retry_queue.retain(|entry| !dropped.contains(&entry.id));
        dropped
    }

    /// Operator-initiated reset back to a pristine checkpoint
    ///
    /// This is the only transition that lowers `last_processed_id`.
    pub fn reset(&mut self) {
        let version = self.version;
        *self = ImportCheckpoint::new();
        // Version survives the reset so concurrent stale writers still lose
        self.version = version;
    }
}

impl Default for ImportCheckpoint {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate statistics for the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportStats {
    pub run_state: RunState,
    pub last_processed_id: i64,
    pub total_processed: u64,
    pub total_failed: u64,
    /// Records found in the source export (0 until a source is parsed)
    pub total_source_records: u64,
    /// Records currently in the catalog store
    pub total_catalog_records: u64,
    pub retry_pending: usize,
    pub errors: Vec<ImportErrorEntry>,
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}
