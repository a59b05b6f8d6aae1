//! Configuration resolution for propsync-import
//!
//! Multi-tier resolution with Database → ENV → TOML priority. The settings
//! table is authoritative once a value has been saved through the API;
//! environment variables cover deployments, the TOML file covers developer
//! machines.

use std::path::Path;

use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use propsync_common::config::{load_toml_config, write_toml_config, TomlConfig};
use propsync_common::Result;

use crate::db::settings::ImportParameters;
use crate::services::DEFAULT_BATCH_SIZE;

/// Resolved runtime configuration of the import service
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Records imported per driver invocation
    pub batch_size: u32,
    /// Host used to construct legacy photo URLs
    pub legacy_photo_host: String,
    /// Path of the WPL SQL export file, if configured
    pub source_export_path: Option<String>,
}

/// Resolve the import configuration from all tiers
pub async fn resolve_import_config(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<ImportConfig> {
    let params = crate::db::settings::load_import_parameters(db).await?;

    let batch_size = resolve_batch_size(&params, toml_config);

    let legacy_photo_host = resolve_value(
        "legacy photo host",
        params.legacy_photo_host.clone(),
        std::env::var("PROPSYNC_LEGACY_PHOTO_HOST").ok(),
        toml_config.legacy_photo_host.clone(),
    )
    .unwrap_or_else(|| {
        warn!("Legacy photo host not configured; constructed photo URLs will use 'localhost'");
        "localhost".to_string()
    });

    let source_export_path = resolve_value(
        "source export path",
        params.source_export_path.clone(),
        std::env::var("PROPSYNC_SOURCE_EXPORT_PATH").ok(),
        toml_config.source_export_path.clone(),
    );

    Ok(ImportConfig {
        batch_size,
        legacy_photo_host,
        source_export_path,
    })
}

/// Mirror saved import parameters into an existing TOML config file
///
/// Keeps developer machines in step with settings changed through the API.
/// Untouched TOML keys (root folder, storage base URL) are preserved.
pub fn sync_settings_to_toml(params: &ImportParameters, path: &Path) -> Result<()> {
    let mut config = load_toml_config(path).unwrap_or_default();
    config.batch_size = Some(params.batch_size);
    if params.legacy_photo_host.is_some() {
        config.legacy_photo_host = params.legacy_photo_host.clone();
    }
    if params.source_export_path.is_some() {
        config.source_export_path = params.source_export_path.clone();
    }
    write_toml_config(&config, path)?;
    info!(path = %path.display(), "Synced import settings to TOML config");
    Ok(())
}

fn resolve_batch_size(params: &ImportParameters, toml_config: &TomlConfig) -> u32 {
    // The settings table always answers; only a non-default value counts as
    // an explicit database override.
    if params.batch_size != DEFAULT_BATCH_SIZE {
        info!("Batch size loaded from database: {}", params.batch_size);
        return params.batch_size.max(1);
    }

    if let Some(size) = std::env::var("PROPSYNC_BATCH_SIZE")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
    {
        info!("Batch size loaded from environment: {}", size);
        return size.max(1);
    }

    if let Some(size) = toml_config.batch_size {
        info!("Batch size loaded from TOML config: {}", size);
        return size.max(1);
    }

    DEFAULT_BATCH_SIZE
}

/// Database → ENV → TOML resolution for one string setting
fn resolve_value(
    name: &str,
    db_value: Option<String>,
    env_value: Option<String>,
    toml_value: Option<String>,
) -> Option<String> {
    let valid = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

    let mut sources = Vec::new();
    if valid(&db_value) {
        sources.push("database");
    }
    if valid(&env_value) {
        sources.push("environment");
    }
    if valid(&toml_value) {
        sources.push("TOML");
    }
    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            sources[0]
        );
    }

    for (value, source) in [
        (db_value, "database"),
        (env_value, "environment"),
        (toml_value, "TOML config"),
    ] {
        if let Some(v) = value {
            if !v.trim().is_empty() {
                info!("{} loaded from {}", name, source);
                return Some(v.trim().to_string());
            }
        }
    }

    None
}
