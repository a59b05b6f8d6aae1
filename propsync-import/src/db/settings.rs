//! Import settings database operations
//!
//! Load/save runtime import parameters from the settings table. Database
//! values override the TOML config; both are overridden by environment
//! variables at resolution time (see `crate::config`).

use serde::Serialize;
use sqlx::SqlitePool;

use propsync_common::{Error, Result};

/// Runtime-tunable import parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportParameters {
    /// Records per driver invocation
    pub batch_size: u32,
    /// Host used to construct legacy photo URLs
    pub legacy_photo_host: Option<String>,
    /// Path of the WPL SQL export file
    pub source_export_path: Option<String>,
}

impl Default for ImportParameters {
    fn default() -> Self {
        Self {
            batch_size: 30,
            legacy_photo_host: None,
            source_export_path: None,
        }
    }
}

/// Load import parameters from the settings table
///
/// Returns defaults for keys that were never saved.
pub async fn load_import_parameters(pool: &SqlitePool) -> Result<ImportParameters> {
    let mut params = ImportParameters::default();

    if let Some(val) = get_setting(pool, "import_batch_size").await? {
        params.batch_size = val
            .parse()
            .map_err(|e| Error::Internal(format!("Invalid import_batch_size setting: {}", e)))?;
    }
    params.legacy_photo_host = get_setting(pool, "legacy_photo_host").await?;
    params.source_export_path = get_setting(pool, "source_export_path").await?;

    Ok(params)
}

/// Save import parameters to the settings table
pub async fn save_import_parameters(pool: &SqlitePool, params: &ImportParameters) -> Result<()> {
    set_setting(pool, "import_batch_size", &params.batch_size.to_string()).await?;
    if let Some(host) = &params.legacy_photo_host {
        set_setting(pool, "legacy_photo_host", host).await?;
    }
    if let Some(path) = &params.source_export_path {
        set_setting(pool, "source_export_path", path).await?;
    }

    tracing::info!("Saved import parameters: batch_size={}", params.batch_size);
    Ok(())
}

pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value)
}

pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn defaults_when_unset() {
        let pool = test_pool().await;
        let params = load_import_parameters(&pool).await.unwrap();
        assert_eq!(params.batch_size, 30);
        assert!(params.legacy_photo_host.is_none());
    }

    #[tokio::test]
    async fn save_and_reload() {
        let pool = test_pool().await;
        let params = ImportParameters {
            batch_size: 10,
            legacy_photo_host: Some("legado.example.com.br".to_string()),
            source_export_path: Some("/srv/export/wpl.sql".to_string()),
        };
        save_import_parameters(&pool, &params).await.unwrap();

        let loaded = load_import_parameters(&pool).await.unwrap();
        assert_eq!(loaded, params);
    }
}
