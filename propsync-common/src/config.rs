//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents (`~/.config/propsync/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for database and checkpoint storage
    pub root_folder: Option<String>,
    /// Path to the WPL SQL export consumed by the importer
    pub source_export_path: Option<String>,
    /// Legacy WordPress host serving the original photo files
    pub legacy_photo_host: Option<String>,
    /// Public base URL of the object-storage photo mirror
    pub storage_base_url: Option<String>,
    /// Records imported per driver invocation
    pub batch_size: Option<u32>,
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = default_config_path() {
        if let Ok(config) = load_toml_config(&config_path) {
            if let Some(root_folder) = config.root_folder {
                return Ok(PathBuf::from(root_folder));
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(get_default_root_folder())
}

/// Get default configuration file path for the platform
pub fn default_config_path() -> Result<PathBuf> {
    let user_config = dirs::config_dir()
        .map(|d| d.join("propsync").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if user_config.exists() {
        return Ok(user_config);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/propsync/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config(format!(
        "Config file not found: {}",
        user_config.display()
    )))
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("propsync"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/propsync"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("propsync"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/propsync"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("propsync"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\propsync"))
    } else {
        PathBuf::from("./propsync_data")
    }
}

/// Create the root folder directory if missing
pub fn ensure_root_folder(root_folder: &Path) -> Result<()> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        tracing::info!(path = %root_folder.display(), "Created root folder");
    }
    Ok(())
}

/// Database file path inside the root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join("propsync.db")
}

/// Load TOML config from an explicit path
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write TOML config atomically (write temp file, then rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}
