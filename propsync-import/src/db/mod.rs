//! Database access for propsync-import
//!
//! One SQLite file in the root folder holds the catalog store, the import
//! checkpoint and the settings table.

pub mod checkpoint;
pub mod properties;
pub mod settings;

use propsync_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to propsync.db in the root folder, creating it if absent.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize propsync-import specific tables
///
/// Creates wordpress_properties, import_checkpoint and settings tables if
/// they don't exist.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    // Settings table for parameter persistence
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Catalog store: one row per legacy listing, keyed by wp_id
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wordpress_properties (
            id TEXT PRIMARY KEY,
            wp_id INTEGER NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'pending',
            data TEXT NOT NULL,
            thumbnail_url TEXT,
            photo_urls TEXT NOT NULL DEFAULT '[]',
            photo_count INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_wordpress_properties_status
         ON wordpress_properties(status)",
    )
    .execute(pool)
    .await?;

    // Import checkpoint: single row, optimistic version guard
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_checkpoint (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_processed_id INTEGER NOT NULL DEFAULT 0,
            total_processed INTEGER NOT NULL DEFAULT 0,
            total_failed INTEGER NOT NULL DEFAULT 0,
            errors TEXT NOT NULL DEFAULT '[]',
            retry_queue TEXT NOT NULL DEFAULT '[]',
            completed_batches TEXT NOT NULL DEFAULT '[]',
            run_state TEXT NOT NULL DEFAULT '"IDLE"',
            started_at TEXT NOT NULL,
            last_updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Database tables initialized (settings, wordpress_properties, import_checkpoint)"
    );

    Ok(())
}
