//! Configuration persistence.

use std::fs;
use std::path::{Path, PathBuf};
use switchyard_types::{AppConfig, ConfigError};
use validator::Validate;

const CONFIG_FILE: &str = "switchyard_config.json";
const DATA_DIR_ENV: &str = "SWITCHYARD_DATA_DIR";
const DATA_DIR_NAME: &str = "switchyard";

/// Get the data directory, creating it if needed.
///
/// `SWITCHYARD_DATA_DIR` overrides the platform data directory.
pub fn get_data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var(DATA_DIR_ENV) {
        Ok(custom) if !custom.trim().is_empty() => PathBuf::from(custom.trim()),
        _ => dirs::data_dir()
            .ok_or_else(|| ConfigError::DataDirUnavailable {
                message: "platform data directory not found".to_string(),
            })?
            .join(DATA_DIR_NAME),
    };
    fs::create_dir_all(&dir).map_err(|e| ConfigError::from_io_error(&e))?;
    Ok(dir)
}

/// Load application config from the data directory.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_data_dir()?)
}

/// Save application config to the data directory.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(&get_data_dir()?, config)
}

/// Load config from `dir`. A missing file yields defaults.
pub fn load_config_from(dir: &Path) -> Result<AppConfig, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(AppConfig::new());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::ParseError {
        message: format!("Failed to read {}: {}", config_path.display(), e),
    })?;
    let config: AppConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))?;
    validate(&config)?;
    Ok(config)
}

/// Validate then atomically write config into `dir`.
pub fn save_config_to(dir: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    validate(config)?;
    fs::create_dir_all(dir).map_err(|e| ConfigError::from_io_error(&e))?;

    let config_path = dir.join(CONFIG_FILE);
    let temp_path = dir.join(format!("{}.tmp", CONFIG_FILE));
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::WriteError { message: e.to_string() })?;

    fs::write(&temp_path, content).map_err(|e| ConfigError::from_io_error(&e))?;
    fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::from_io_error(&e))
}

/// Update specific fields in the config stored in `dir`.
pub fn update_config_in<F>(dir: &Path, updater: F) -> Result<AppConfig, ConfigError>
where
    F: FnOnce(&mut AppConfig),
{
    let mut config = load_config_from(dir)?;
    updater(&mut config);
    save_config_to(dir, &config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "config".to_string());
        ConfigError::ValidationError { field, message: errors.to_string() }
    })
}
