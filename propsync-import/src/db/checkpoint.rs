//! Checkpoint persistence
//!
//! The checkpoint is a single row guarded by an optimistic version column.
//! Every save is a compare-and-swap on the version a caller loaded; a stale
//! writer gets `Error::Conflict` instead of silently clobbering a newer
//! checkpoint.

use sqlx::{Row, SqlitePool};

use propsync_common::{Error, Result};

use crate::models::{ImportCheckpoint, ImportErrorEntry, RetryEntry, RunState};

/// Load the checkpoint, creating a pristine one on first access
pub async fn load_checkpoint(pool: &SqlitePool) -> Result<ImportCheckpoint> {
    let row = sqlx::query(
        r#"
        SELECT last_processed_id, total_processed, total_failed,
               errors, retry_queue, completed_batches,
               run_state, started_at, last_updated_at, version
        FROM import_checkpoint
        WHERE id = 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let errors: String = row.get("errors");
            let errors: Vec<ImportErrorEntry> = serde_json::from_str(&errors)
                .map_err(|e| Error::Internal(format!("Failed to deserialize errors: {}", e)))?;

            let retry_queue: String = row.get("retry_queue");
            let retry_queue: Vec<RetryEntry> = serde_json::from_str(&retry_queue)
                .map_err(|e| Error::Internal(format!("Failed to deserialize retry queue: {}", e)))?;

            let completed_batches: String = row.get("completed_batches");
            let completed_batches: Vec<i64> = serde_json::from_str(&completed_batches)
                .map_err(|e| {
                    Error::Internal(format!("Failed to deserialize completed batches: {}", e))
                })?;

            let run_state: String = row.get("run_state");
            let run_state: RunState = serde_json::from_str(&run_state)
                .map_err(|e| Error::Internal(format!("Failed to deserialize run state: {}", e)))?;

            let started_at: String = row.get("started_at");
            let started_at = chrono::DateTime::parse_from_rfc3339(&started_at)
                .map_err(|e| Error::Internal(format!("Failed to parse started_at: {}", e)))?
                .with_timezone(&chrono::Utc);

            let last_updated_at: String = row.get("last_updated_at");
            let last_updated_at = chrono::DateTime::parse_from_rfc3339(&last_updated_at)
                .map_err(|e| Error::Internal(format!("Failed to parse last_updated_at: {}", e)))?
                .with_timezone(&chrono::Utc);

            Ok(ImportCheckpoint {
                last_processed_id: row.get("last_processed_id"),
                total_processed: row.get::<i64, _>("total_processed") as u64,
                total_failed: row.get::<i64, _>("total_failed") as u64,
                errors,
                retry_queue,
                completed_batches,
                run_state,
                started_at,
                last_updated_at,
                version: row.get("version"),
            })
        }
        None => {
            let checkpoint = ImportCheckpoint::new();
            insert_checkpoint(pool, &checkpoint).await?;
            Ok(checkpoint)
        }
    }
}

/// Save the checkpoint with a compare-and-swap on its version
///
/// On success the in-memory version is advanced so the caller can keep
/// saving without reloading. `Error::Conflict` means another writer saved
/// first; the caller must reload and decide what to do.
pub async fn save_checkpoint(pool: &SqlitePool, checkpoint: &mut ImportCheckpoint) -> Result<()> {
    checkpoint.last_updated_at = chrono::Utc::now();

    // Prepare all data BEFORE acquiring database connection
    let errors = serde_json::to_string(&checkpoint.errors)
        .map_err(|e| Error::Internal(format!("Failed to serialize errors: {}", e)))?;
    let retry_queue = serde_json::to_string(&checkpoint.retry_queue)
        .map_err(|e| Error::Internal(format!("Failed to serialize retry queue: {}", e)))?;
    let completed_batches = serde_json::to_string(&checkpoint.completed_batches)
        .map_err(|e| Error::Internal(format!("Failed to serialize completed batches: {}", e)))?;
    let run_state = serde_json::to_string(&checkpoint.run_state)
        .map_err(|e| Error::Internal(format!("Failed to serialize run state: {}", e)))?;

    let result = sqlx::query(
        r#"
        UPDATE import_checkpoint
        SET last_processed_id = ?,
            total_processed = ?,
            total_failed = ?,
            errors = ?,
            retry_queue = ?,
            completed_batches = ?,
            run_state = ?,
            started_at = ?,
            last_updated_at = ?,
            version = version + 1
        WHERE id = 1 AND version = ?
        "#,
    )
    .bind(checkpoint.last_processed_id)
    .bind(checkpoint.total_processed as i64)
    .bind(checkpoint.total_failed as i64)
    .bind(&errors)
    .bind(&retry_queue)
    .bind(&completed_batches)
    .bind(&run_state)
    .bind(checkpoint.started_at.to_rfc3339())
    .bind(checkpoint.last_updated_at.to_rfc3339())
    .bind(checkpoint.version)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(format!(
            "checkpoint version {} is stale; another import run saved first",
            checkpoint.version
        )));
    }

    checkpoint.version += 1;
    Ok(())
}

/// Reset the checkpoint to pristine, preserving the version counter
///
/// Operator-only; never invoked by the driver itself.
pub async fn reset_checkpoint(pool: &SqlitePool) -> Result<ImportCheckpoint> {
    let mut checkpoint = load_checkpoint(pool).await?;
    checkpoint.reset();
    save_checkpoint(pool, &mut checkpoint).await?;
    Ok(checkpoint)
}

async fn insert_checkpoint(pool: &SqlitePool, checkpoint: &ImportCheckpoint) -> Result<()> {
    let run_state = serde_json::to_string(&checkpoint.run_state)
        .map_err(|e| Error::Internal(format!("Failed to serialize run state: {}", e)))?;

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO import_checkpoint (
            id, last_processed_id, total_processed, total_failed,
            errors, retry_queue, completed_batches,
            run_state, started_at, last_updated_at, version
        ) VALUES (1, 0, 0, 0, '[]', '[]', '[]', ?, ?, ?, 0)
        "#,
    )
    .bind(&run_state)
    .bind(checkpoint.started_at.to_rfc3339())
    .bind(checkpoint.last_updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}
