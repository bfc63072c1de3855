//! Configuration loading and database path resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Database path resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`database` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_database_path(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(database) = config.get("database").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(database));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_data_dir().join("lessonloop.db"))
}

/// Get default configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    // Try ~/.config/lessonloop/config.toml first, then /etc/lessonloop/config.toml
    if let Some(path) = dirs::config_dir().map(|d| d.join("lessonloop").join("config.toml")) {
        if path.exists() {
            return Ok(path);
        }
    }

    let system_config = PathBuf::from("/etc/lessonloop/config.toml");
    if system_config.exists() {
        return Ok(system_config);
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default data folder path
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lessonloop"))
        .unwrap_or_else(|| PathBuf::from("./lessonloop_data"))
}
